//! Error types for the rebaser core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type. Failing to find a version in a line is never an error; it is
//! represented as `None` by the extractor.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Rebase(#[from] RebaseError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Version errors
// ---------------------------------------------------------------------------

/// Returned by `Version::from_str` for text that is not a version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version: '{0}'")]
pub struct VersionParseError(pub String);

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from `git` CLI invocations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` binary was not found on `$PATH`.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// A `git` command exited with a non-zero status.
    #[error("git command failed (exit {exit_code}): {stderr}")]
    CommandFailed { exit_code: i32, stderr: String },

    /// The repository path does not exist.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Resolve errors
// ---------------------------------------------------------------------------

/// Fatal errors while resolving a conflicted file.
///
/// An unresolvable conflict is not an error: the resolver reports it as
/// `Ok(false)`. Only I/O that should abort the whole run ends up here.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Reading, writing or removing the conflicted file failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Rebase errors
// ---------------------------------------------------------------------------

/// Errors that escape the rebase state machine.
#[derive(Debug, Error)]
pub enum RebaseError {
    /// A git invocation failed in a way that is not a rebase conflict.
    #[error("rebase git error: {0}")]
    GitError(#[from] GitError),

    /// A conflicted file could not be processed.
    #[error("rebase resolve error: {0}")]
    ResolveError(#[from] ResolveError),

    /// A state-machine transition was invalid.
    #[error("invalid rebase transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
