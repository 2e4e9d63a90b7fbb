//! Container base-image directives (`FROM image:tag`).

use super::Dependency;
use crate::version::Version;

const DIRECTIVE: &str = "FROM";
const FLAG_PREFIX: &str = "--";

/// Extract the image name and tag version from a `FROM` line.
///
/// Flags such as `--platform=$BUILDPLATFORM` are skipped, a `@sha256:...`
/// digest is ignored, and the tag is split off at the last `:` so registries
/// with a port (`localhost:5000/app:1.2`) keep their full name.
pub fn extract(fragment: &str) -> Option<Dependency> {
    if !fragment.starts_with(DIRECTIVE) {
        return None;
    }

    let mut tokens = fragment.split_whitespace();
    if tokens.next()? != DIRECTIVE {
        return None;
    }

    let mut image = tokens.next()?;
    if image.starts_with(FLAG_PREFIX) {
        image = tokens.next()?;
    }

    let image = image.split('@').next().unwrap_or(image);
    let (name, tag) = image.rsplit_once(':')?;
    if name.is_empty() {
        return None;
    }

    Version::parse(tag).map(|version| Dependency::new(name, version))
}
