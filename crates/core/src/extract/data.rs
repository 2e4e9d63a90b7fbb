//! Keyed data fragments: JSON object members, TOML key/value pairs and
//! `key: value` lines.

use serde_json::{Map, Value};

use super::Dependency;
use crate::version::Version;

/// Strip a single `^` or `~` range qualifier and parse what remains.
fn parse_requirement(value: &str) -> Option<Version> {
    let value = value.strip_prefix(|c: char| c == '^' || c == '~').unwrap_or(value);
    Version::parse(value)
}

/// Read a fragment as the body of a JSON object, e.g. `"react": "^18.2.0",`.
fn parse_json(fragment: &str) -> Option<Map<String, Value>> {
    let mut body = fragment.trim();
    if let Some(stripped) = body.strip_suffix(',') {
        body = stripped;
    }

    if !body.starts_with('{') && !body.ends_with('}') {
        serde_json::from_str(&format!("{{{body}}}")).ok()
    } else {
        serde_json::from_str(body).ok()
    }
}

/// Read a fragment as TOML, e.g. `serde = "1.0.188"`.
fn parse_toml(fragment: &str) -> Option<toml::Table> {
    toml::from_str(fragment.trim()).ok()
}

/// The first string member that holds a version names the dependency.
fn first_versioned<'a, V: 'a>(
    members: impl IntoIterator<Item = (&'a String, &'a V)>,
    as_str: impl Fn(&V) -> Option<&str>,
) -> Option<Dependency> {
    members.into_iter().find_map(|(key, value)| {
        let version = parse_requirement(as_str(value)?)?;
        Some(Dependency::new(key.clone(), version))
    })
}

/// Read a YAML-style `key: "value"` line.
fn from_key_value(fragment: &str) -> Option<Dependency> {
    let (key, value) = fragment.trim().split_once(':')?;
    let key = unquote(key.trim());
    let is_quoted = |c: char| c == '"' || c == '\'';
    if key.is_empty() || key.contains(char::is_whitespace) || key.contains(is_quoted) {
        return None;
    }

    let value = value.trim();
    let value = value.strip_suffix(',').unwrap_or(value).trim();
    let version = parse_requirement(unquote(value))?;
    Some(Dependency::new(key, version))
}

fn unquote(s: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|q| s.strip_prefix(*q)?.strip_suffix(*q))
        .unwrap_or(s)
}

/// Extract a dependency from a keyed data fragment.
///
/// Markup is left to the markup strategy, so fragments starting with `<` are
/// rejected outright.
pub fn extract(fragment: &str) -> Option<Dependency> {
    if fragment.starts_with('<') {
        return None;
    }
    // A fragment that parses as structured data is judged by that parse
    // alone; the looser `key: value` reading only applies to the rest.
    if let Some(object) = parse_json(fragment) {
        return first_versioned(&object, Value::as_str);
    }
    if let Some(table) = parse_toml(fragment) {
        return first_versioned(&table, toml::Value::as_str);
    }
    from_key_value(fragment)
}
