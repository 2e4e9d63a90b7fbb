//! Git operations for the rebaser.

pub mod client;

pub use client::{parse_conflicted_files, GitCli, RebaseTool};
