//! Splitting conflicted text into plain lines and conflict regions.
//!
//! Git writes a conflict during a rebase as
//!
//! ```text
//! <<<<<<< HEAD            (the branch being rebased onto: "theirs")
//! ...
//! ||||||| base            (optional, diff3 style; ignored)
//! ...
//! =======
//! ...
//! >>>>>>> abc123 (commit) (the commit being replayed: "ours")
//! ```
//!
//! Lines are split on the file's own line terminator and joined back with
//! it, so a file without markers renders byte-identically.

pub const THEIRS_MARKER: &str = "<<<<<<<";
pub const BASE_MARKER: &str = "|||||||";
pub const MIDPOINT_MARKER: &str = "=======";
pub const OURS_MARKER: &str = ">>>>>>>";

/// The line terminator used by a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    /// CRLF if the text contains one anywhere, LF otherwise.
    pub fn detect(text: &str) -> Self {
        if text.contains("\r\n") {
            Self::CrLf
        } else {
            Self::Lf
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// One conflict region with its two sides, markers excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRegion<'a> {
    pub theirs: Vec<&'a str>,
    pub ours: Vec<&'a str>,
}

/// A run of the file: either a plain line or a whole conflict region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Line(&'a str),
    Conflict(ConflictRegion<'a>),
}

/// A file's text broken into segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictedText<'a> {
    pub line_ending: LineEnding,
    pub segments: Vec<Segment<'a>>,
}

#[derive(Clone, Copy)]
enum Scan {
    Outside,
    Theirs,
    Base,
    Ours,
}

impl<'a> ConflictedText<'a> {
    /// Parse `text` into segments.
    ///
    /// Returns `None` when the markers are malformed: a region that never
    /// closes or a second opening marker inside a region.
    pub fn parse(text: &'a str) -> Option<Self> {
        let line_ending = LineEnding::detect(text);
        let mut segments = Vec::new();
        let mut region = ConflictRegion {
            theirs: Vec::new(),
            ours: Vec::new(),
        };
        let mut scan = Scan::Outside;

        for line in text.split(line_ending.as_str()) {
            scan = match scan {
                Scan::Outside if line.starts_with(THEIRS_MARKER) => Scan::Theirs,
                Scan::Outside => {
                    segments.push(Segment::Line(line));
                    Scan::Outside
                }
                _ if line.starts_with(THEIRS_MARKER) => return None,
                Scan::Theirs | Scan::Base if line.starts_with(MIDPOINT_MARKER) => Scan::Ours,
                Scan::Theirs if line.starts_with(BASE_MARKER) => Scan::Base,
                Scan::Theirs => {
                    region.theirs.push(line);
                    Scan::Theirs
                }
                Scan::Base => Scan::Base,
                Scan::Ours if line.starts_with(OURS_MARKER) => {
                    segments.push(Segment::Conflict(std::mem::replace(
                        &mut region,
                        ConflictRegion {
                            theirs: Vec::new(),
                            ours: Vec::new(),
                        },
                    )));
                    Scan::Outside
                }
                Scan::Ours => {
                    region.ours.push(line);
                    Scan::Ours
                }
            };
        }

        matches!(scan, Scan::Outside).then_some(Self {
            line_ending,
            segments,
        })
    }

    pub fn conflict_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Conflict(_)))
            .count()
    }

    pub fn has_conflicts(&self) -> bool {
        self.conflict_count() > 0
    }
}

/// Join resolved lines with the original terminator.
pub fn join_lines<S: AsRef<str>>(lines: &[S], line_ending: LineEnding) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push_str(line_ending.as_str());
        }
        out.push_str(line.as_ref());
    }
    out
}
