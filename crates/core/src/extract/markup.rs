//! Markup (XML) fragments such as MSBuild package declarations.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::Dependency;
use crate::version::Version;

/// Elements that declare a package through `Include` + `Version` attributes.
const PACKAGE_ELEMENTS: [&[u8]; 2] = [b"PackageVersion", b"PackageReference"];
const NAME_ATTRIBUTES: [&[u8]; 2] = [b"Include", b"Update"];
const VERSION_ATTRIBUTE: &[u8] = b"Version";

/// One top-level element of the fragment.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(Vec<u8>, String)>,
    text: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Option<Self> {
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.ok()?;
            attributes.push((
                attr.key.as_ref().to_vec(),
                String::from_utf8_lossy(&attr.value).into_owned(),
            ));
        }
        Some(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            text: String::new(),
        })
    }

    fn attribute(&self, key: &[u8]) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.as_slice() == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse `fragment` into its top-level elements. Returns `None` for anything
/// that is not well-formed markup, including bare text outside an element.
fn parse_roots(fragment: &str) -> Option<Vec<Element>> {
    let mut reader = Reader::from_str(fragment);
    reader.config_mut().trim_text(true);

    let mut roots: Vec<Element> = Vec::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event().ok()? {
            Event::Start(ref e) => {
                if depth == 0 {
                    roots.push(Element::from_start(e)?);
                }
                depth += 1;
            }
            Event::Empty(ref e) => {
                if depth == 0 {
                    roots.push(Element::from_start(e)?);
                }
            }
            Event::End(_) => {
                depth = depth.checked_sub(1)?;
            }
            Event::Text(ref t) => {
                let text = String::from_utf8_lossy(t);
                match (depth, roots.last_mut()) {
                    (0, _) => return None,
                    (1, Some(root)) => root.text.push_str(&text),
                    _ => {}
                }
            }
            Event::CData(ref t) => {
                if let (1, Some(root)) = (depth, roots.last_mut()) {
                    root.text.push_str(&String::from_utf8_lossy(t));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    (depth == 0).then_some(roots)
}

/// Extract a dependency from a single markup element.
///
/// Package elements yield their `Include` (or `Update`) name and `Version`
/// attribute. Any other lone element is read as `<Name>version</Name>`, with
/// a sole attribute standing in for missing text.
pub fn extract(fragment: &str) -> Option<Dependency> {
    let mut roots = parse_roots(fragment)?;
    if roots.len() != 1 {
        return None;
    }
    let root = roots.pop()?;

    let is_package = PACKAGE_ELEMENTS
        .iter()
        .any(|element| *element == root.name.as_bytes());
    let version_attribute = root.attribute(VERSION_ATTRIBUTE).map(str::to_string);

    let (name, version) = match version_attribute {
        Some(version) if is_package => {
            let name = NAME_ATTRIBUTES
                .iter()
                .find_map(|key| root.attribute(key))
                .unwrap_or_default()
                .to_string();
            (name, version)
        }
        _ => {
            let version = if !root.text.is_empty() {
                root.text.clone()
            } else if let [(_, value)] = root.attributes.as_slice() {
                value.clone()
            } else {
                return None;
            };
            (root.name, version)
        }
    };

    Version::parse(version.trim()).map(|version| Dependency::new(name, version))
}
