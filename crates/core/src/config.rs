//! TOML-based configuration for the rebaser.
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! configuration that rebases onto `main` in the current directory as the
//! GitHub Actions bot. The CLI overlays its flags on top of what is loaded.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RebaserConfig {
    /// What to rebase and how.
    #[serde(default)]
    pub rebase: RebaseConfig,

    /// Committer identity used for rewritten commits.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Conflict resolver settings.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Rebase
// ---------------------------------------------------------------------------

/// Rebase target and interaction settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RebaseConfig {
    /// Branch to rebase onto (default `main`).
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Path of the repository working tree (default `.`).
    #[serde(default = "default_repository")]
    pub repository: PathBuf,

    /// Offer a manual edit for a file the resolver gives up on.
    #[serde(default)]
    pub interactive: bool,

    /// Editor command used in interactive mode; the file path is appended.
    #[serde(default = "default_editor")]
    pub editor: Vec<String>,
}

fn default_branch() -> String {
    "main".into()
}
fn default_repository() -> PathBuf {
    PathBuf::from(".")
}
fn default_editor() -> Vec<String> {
    vec!["code".into(), "--wait".into()]
}

impl Default for RebaseConfig {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            repository: default_repository(),
            interactive: false,
            editor: default_editor(),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Committer identity passed to git for the rewritten commits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityConfig {
    #[serde(default = "default_user_name")]
    pub name: String,

    #[serde(default = "default_user_email")]
    pub email: String,
}

fn default_user_name() -> String {
    "github-actions[bot]".into()
}
fn default_user_email() -> String {
    "github-actions[bot]@users.noreply.github.com".into()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: default_user_name(),
            email: default_user_email(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// File-kind dispatch and lock-file regeneration settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Files whose name ends with this are regenerated instead of merged.
    #[serde(default = "default_lock_file_name")]
    pub lock_file_name: String,

    /// Files with exactly this name are merged line by line only.
    #[serde(default = "default_container_file_name")]
    pub container_file_name: String,

    /// Command run in the lock file's directory to regenerate it.
    #[serde(default = "default_install_command")]
    pub install_command: Vec<String>,
}

fn default_lock_file_name() -> String {
    "package-lock.json".into()
}
fn default_container_file_name() -> String {
    "Dockerfile".into()
}
fn default_install_command() -> Vec<String> {
    vec!["npm".into(), "install".into()]
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            lock_file_name: default_lock_file_name(),
            container_file_name: default_container_file_name(),
            install_command: default_install_command(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl RebaserConfig {
    /// Load a [`RebaserConfig`] from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rebase.branch.trim().is_empty() {
            return Err(invalid("rebase.branch", "branch must not be empty"));
        }
        if self.rebase.editor.is_empty() {
            return Err(invalid("rebase.editor", "editor command must not be empty"));
        }
        if self.identity.name.trim().is_empty() {
            return Err(invalid("identity.name", "committer name must not be empty"));
        }
        if !self.identity.email.contains('@') {
            return Err(invalid(
                "identity.email",
                "committer email must be an address",
            ));
        }
        if self.resolver.lock_file_name.is_empty() {
            return Err(invalid("resolver.lock_file_name", "file name must not be empty"));
        }
        if self.resolver.container_file_name.is_empty() {
            return Err(invalid(
                "resolver.container_file_name",
                "file name must not be empty",
            ));
        }
        if self.resolver.install_command.is_empty() {
            return Err(invalid(
                "resolver.install_command",
                "install command must not be empty",
            ));
        }
        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Generate a default TOML config template string.
    pub fn default_template() -> &'static str {
        r#"# Rebaser configuration

[rebase]
branch = "main"
repository = "."
# Offer a manual edit when a conflict cannot be resolved automatically.
interactive = false
editor = ["code", "--wait"]

[identity]
name = "github-actions[bot]"
email = "github-actions[bot]@users.noreply.github.com"

[resolver]
lock_file_name = "package-lock.json"
container_file_name = "Dockerfile"
install_command = ["npm", "install"]

[logging]
level = "info"
"#
    }
}

fn invalid(field: &str, detail: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        detail: detail.into(),
    }
}
