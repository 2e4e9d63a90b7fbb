//! Dependency extraction from single lines of manifest text.
//!
//! A conflicted line may come from an MSBuild props file, a JSON manifest, a
//! TOML/YAML-ish settings file or a Dockerfile. Rather than parse whole files,
//! each strategy looks at one line (or a small fragment) and tries to recover
//! exactly one `(name, version)` pair from it:
//!
//! 1. **Markup** -- `<PackageVersion Include="X" Version="1.2.3" />` or
//!    `<Version>1.2.3</Version>`.
//! 2. **Data** -- `"X": "^1.2.3",` or `version = "1.2.3"`.
//! 3. **Image** -- `FROM registry/image:1.2.3@sha256:...`.
//!
//! Strategies are tried in that order and the first match wins. A fragment
//! that matches none of them simply has no dependency.

pub mod data;
pub mod image;
pub mod markup;

use serde::Serialize;
use tracing::trace;

use crate::version::Version;

/// A `(name, version)` pair declared by one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    /// Exact dependency name; compared case-sensitively.
    pub name: String,
    #[serde(serialize_with = "serialize_version")]
    pub version: Version,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

fn serialize_version<S: serde::Serializer>(version: &Version, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(version)
}

/// A single extraction strategy.
pub type Strategy = fn(&str) -> Option<Dependency>;

/// Strategies in priority order.
pub const STRATEGIES: &[(&str, Strategy)] = &[
    ("markup", markup::extract),
    ("data", data::extract),
    ("image", image::extract),
];

/// Try every strategy on `fragment` and return the first dependency found.
pub fn extract_dependency(fragment: &str) -> Option<Dependency> {
    STRATEGIES.iter().find_map(|(kind, strategy)| {
        let dependency = strategy(fragment)?;
        trace!(
            kind,
            name = %dependency.name,
            version = %dependency.version,
            "extracted dependency"
        );
        Some(dependency)
    })
}
