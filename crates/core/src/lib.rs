//! Rebaser core library.
//!
//! This crate provides the building blocks for rebasing a branch whose
//! commits only bump dependency versions: version parsing and ordering,
//! dependency extraction from manifest lines, conflict resolution, a `git`
//! CLI client and the rebase orchestrator that ties them together.

pub mod config;
pub mod conflict;
pub mod errors;
pub mod extract;
pub mod git;
pub mod rebase;
pub mod version;

// Re-exports for convenience.
pub use config::RebaserConfig;
pub use conflict::ConflictResolver;
pub use extract::{extract_dependency, Dependency};
pub use git::{GitCli, RebaseTool};
pub use rebase::{RebaseOptions, RebaseResult, Rebaser};
pub use version::Version;
