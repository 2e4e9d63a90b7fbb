//! Version-aware merging of a single conflict region.
//!
//! Two modes are available:
//!
//! 1. **Line mode** -- both sides have the same number of lines and each
//!    aligned pair is either identical or declares the same dependency. The
//!    higher version wins; on a tie our line is kept.
//! 2. **Chunk mode** -- each side is treated as an unordered set of
//!    dependencies. Common names take the higher version, names present on
//!    only one side are kept, and non-dependency lines must match their
//!    counterpart at the same index.
//!
//! Either mode gives up (returns `None`) rather than guess.

use std::collections::HashMap;

use tracing::debug;

use super::region::ConflictRegion;
use crate::extract::{extract_dependency, Dependency};

/// Which modes a region may be merged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Line mode only.
    LineOnly,
    /// Line mode, then chunk mode if that fails.
    LineThenChunk,
}

/// Merge one conflict region, trying line mode first.
pub fn merge_region<'a>(region: &ConflictRegion<'a>, mode: MergeMode) -> Option<Vec<&'a str>> {
    if let Some(lines) = merge_by_line(&region.theirs, &region.ours) {
        return Some(lines);
    }
    match mode {
        MergeMode::LineOnly => None,
        MergeMode::LineThenChunk => merge_by_chunk(&region.theirs, &region.ours),
    }
}

/// Pick between two lines that declare the same dependency.
///
/// Identical lines are kept once. Otherwise both must declare the same name,
/// and their line wins only with a strictly greater version.
pub fn merge_line<'a>(theirs: &'a str, ours: &'a str) -> Option<&'a str> {
    if theirs == ours {
        return Some(ours);
    }
    let their_dep = extract_dependency(theirs)?;
    let our_dep = extract_dependency(ours)?;
    if their_dep.name != our_dep.name {
        return None;
    }
    Some(pick(theirs, &their_dep, ours, &our_dep))
}

fn pick<'a>(
    theirs: &'a str,
    their_dep: &Dependency,
    ours: &'a str,
    our_dep: &Dependency,
) -> &'a str {
    if their_dep.version > our_dep.version {
        debug!(
            name = %our_dep.name,
            from = %our_dep.version,
            to = %their_dep.version,
            "keeping their version"
        );
        theirs
    } else {
        debug!(
            name = %our_dep.name,
            version = %our_dep.version,
            "keeping our version"
        );
        ours
    }
}

/// Line mode: pairwise resolution of equally sized sides.
pub fn merge_by_line<'a>(theirs: &[&'a str], ours: &[&'a str]) -> Option<Vec<&'a str>> {
    if theirs.len() != ours.len() {
        return None;
    }
    theirs
        .iter()
        .zip(ours)
        .map(|(&t, &o)| merge_line(t, o))
        .collect()
}

// ---------------------------------------------------------------------------
// Chunk mode
// ---------------------------------------------------------------------------

struct ParsedLine<'a> {
    text: &'a str,
    dependency: Option<Dependency>,
}

/// One side of a region with its dependencies indexed by name.
struct Chunk<'a> {
    lines: Vec<ParsedLine<'a>>,
    by_name: HashMap<String, usize>,
}

impl<'a> Chunk<'a> {
    fn new(lines: &[&'a str]) -> Self {
        let lines: Vec<ParsedLine<'a>> = lines
            .iter()
            .map(|&text| ParsedLine {
                text,
                dependency: extract_dependency(text),
            })
            .collect();
        let by_name = lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| Some((line.dependency.as_ref()?.name.clone(), i)))
            .collect();
        Self { lines, by_name }
    }

    fn lookup(&self, name: &str) -> Option<(&'a str, &Dependency)> {
        let line = &self.lines[*self.by_name.get(name)?];
        Some((line.text, line.dependency.as_ref()?))
    }
}

/// Chunk mode: merge the two sides as sets of dependencies.
///
/// Our lines set the order. A dependency only their side declares is placed
/// before the our-line at the same index, or at the end when their side is
/// longer.
pub fn merge_by_chunk<'a>(theirs: &[&'a str], ours: &[&'a str]) -> Option<Vec<&'a str>> {
    let their_chunk = Chunk::new(theirs);
    let our_chunk = Chunk::new(ours);

    let mut additions = their_chunk
        .lines
        .iter()
        .enumerate()
        .filter(|(_, line)| {
            line.dependency
                .as_ref()
                .is_some_and(|dep| !our_chunk.by_name.contains_key(&dep.name))
        })
        .map(|(i, line)| (i, line.text))
        .peekable();

    let mut merged = Vec::with_capacity(theirs.len().max(ours.len()));
    for (index, line) in our_chunk.lines.iter().enumerate() {
        while let Some((_, text)) = additions.next_if(|(i, _)| *i <= index) {
            debug!(line = text, "keeping dependency added on their side");
            merged.push(text);
        }

        match &line.dependency {
            Some(our_dep) => match their_chunk.lookup(&our_dep.name) {
                Some((their_text, their_dep)) => {
                    merged.push(pick(their_text, their_dep, line.text, our_dep));
                }
                None => merged.push(line.text),
            },
            None => {
                let counterpart = their_chunk.lines.get(index).map(|l| l.text);
                if counterpart != Some(line.text) {
                    debug!(line = line.text, "unmatched line without a dependency");
                    return None;
                }
                merged.push(line.text);
            }
        }
    }
    merged.extend(additions.map(|(_, text)| text));

    Some(merged)
}
