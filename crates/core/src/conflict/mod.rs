//! Conflict parsing, merging and file-level resolution.
//!
//! The conflict subsystem is responsible for:
//! 1. **Parsing** -- splitting a conflicted file into plain lines and
//!    marker-delimited regions.
//! 2. **Merging** -- choosing the higher dependency version inside a region,
//!    line by line or as a chunk.
//! 3. **Resolution** -- deciding per file how to resolve it and writing the
//!    result back.

pub mod merger;
pub mod region;
pub mod resolver;

pub use merger::{merge_region, MergeMode};
pub use region::{ConflictRegion, ConflictedText, LineEnding, Segment};
pub use resolver::{resolve_text, ConflictResolver, FileKind};
