//! Dependency version numbers.
//!
//! A [`Version`] is a dot-separated numeric prefix of one to four components
//! (`major[.minor[.patch[.build]]]`) optionally followed by `-` and a free-form
//! prerelease label. Missing trailing components are kept as *absent* rather
//! than zero, so `1` and `1.0` are different versions and `1` sorts first.
//!
//! Components are kept as written. `22.04` formats back as `22.04` and
//! compares equal to `22.4`. Digit strings compare by value at any length.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::errors::VersionParseError;

const PRERELEASE_MARKER: char = '-';
const COMPONENT_SEPARATOR: char = '.';
const MAX_COMPONENTS: usize = 4;

/// A numeric component in its original spelling.
#[derive(Debug, Clone)]
struct Number(String);

impl Number {
    fn parse(segment: &str) -> Option<Self> {
        is_digits(segment).then(|| Self(segment.to_string()))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_digits(&self.0, &other.0)
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        significant(&self.0).hash(state);
    }
}

/// A parsed, comparable version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    major: Number,
    minor: Option<Number>,
    patch: Option<Number>,
    build: Option<Number>,
    prerelease: String,
}

impl Version {
    /// Parse `text`, returning `None` when it is not a version.
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }

        let (numbers, prerelease) = match text.split_once(PRERELEASE_MARKER) {
            Some((_, "")) => return None,
            Some((numbers, prerelease)) => (numbers, prerelease),
            None => (text, ""),
        };

        let segments: Vec<&str> = numbers.split(COMPONENT_SEPARATOR).collect();
        if segments.len() > MAX_COMPONENTS {
            return None;
        }
        let mut components = segments
            .into_iter()
            .map(Number::parse)
            .collect::<Option<Vec<_>>>()?
            .into_iter();

        Some(Self {
            major: components.next()?,
            minor: components.next(),
            patch: components.next(),
            build: components.next(),
            prerelease: prerelease.to_string(),
        })
    }

    pub fn major(&self) -> &str {
        &self.major.0
    }

    pub fn minor(&self) -> Option<&str> {
        self.minor.as_ref().map(|n| n.0.as_str())
    }

    pub fn patch(&self) -> Option<&str> {
        self.patch.as_ref().map(|n| n.0.as_str())
    }

    pub fn build(&self) -> Option<&str> {
        self.build.as_ref().map(|n| n.0.as_str())
    }

    /// The prerelease label, empty for a release version.
    pub fn prerelease(&self) -> &str {
        &self.prerelease
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    fn components(&self) -> impl Iterator<Item = &str> + '_ {
        std::iter::once(Some(self.major()))
            .chain([self.minor(), self.patch(), self.build()])
            .map_while(|c| c)
    }
}

fn is_digits(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

/// Digits without leading zeros; empty for zero.
fn significant(digits: &str) -> &str {
    digits.trim_start_matches('0')
}

/// Numeric order of two ASCII digit strings.
fn compare_digits(left: &str, right: &str) -> Ordering {
    let (left, right) = (significant(left), significant(right));
    left.len().cmp(&right.len()).then_with(|| left.cmp(right))
}

fn compare_prerelease(left: &str, right: &str) -> Ordering {
    let left_parts: Vec<&str> = left.split(COMPONENT_SEPARATOR).collect();
    let right_parts: Vec<&str> = right.split(COMPONENT_SEPARATOR).collect();

    // Numeric parts compare as numbers so that `alpha.10` follows `alpha.9`.
    if left_parts.len() == right_parts.len() {
        for (l, r) in left_parts.iter().zip(&right_parts) {
            let ordering = if is_digits(l) && is_digits(r) {
                compare_digits(l, r)
            } else {
                l.cmp(r)
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
    }

    left.cmp(right)
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
            .then_with(|| self.build.cmp(&other.build))
            .then_with(|| match (self.is_prerelease(), other.is_prerelease()) {
                (true, true) => compare_prerelease(&self.prerelease, &other.prerelease),
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => Ordering::Equal,
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in self.components() {
            if !first {
                write!(f, "{COMPONENT_SEPARATOR}")?;
            }
            write!(f, "{component}")?;
            first = false;
        }
        if self.is_prerelease() {
            write!(f, "{PRERELEASE_MARKER}{}", self.prerelease)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| VersionParseError(s.to_string()))
    }
}
