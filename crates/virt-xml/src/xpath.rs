//! Location path subset understood by [`crate::XmlDocument::evaluate`].
//!
//! Paths are `/`-separated steps, optionally absolute. A step is an element
//! name (or `*`), `.`, `..`, or a final `@attribute`. Element steps accept a
//! single predicate: `[n]`, `[@attr]`, `[@attr='value']` or `[child='value']`.

use crate::XmlError;

/// Parsed location path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationPath {
    /// `true` when the path starts at the document node.
    pub absolute: bool,
    pub steps: Vec<Step>,
}

/// One step of a [`LocationPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// `.`
    Current,
    /// `..`
    Parent,
    /// Child element step; `name` may be `*`.
    Element {
        name: String,
        predicate: Option<Predicate>,
    },
    /// Attribute of the current element; always the last step.
    Attribute(String),
}

/// Element step filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// 1-based position among the matching siblings.
    Position(usize),
    HasAttribute(String),
    AttributeEquals(String, String),
    /// A child element with the given name whose text equals the value.
    ChildEquals(String, String),
}

impl LocationPath {
    /// Parse `path` into steps.
    pub fn parse(path: &str) -> Result<Self, XmlError> {
        let absolute = path.starts_with('/');
        let segments = split_segments(path)?;
        if segments.is_empty() && !absolute {
            return Err(XmlError::xpath(path, "empty path"));
        }
        let mut steps = Vec::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            let step = parse_step(path, segment)?;
            if matches!(step, Step::Attribute(_)) && index + 1 != segments.len() {
                return Err(XmlError::xpath(path, "attribute step must be last"));
            }
            steps.push(step);
        }
        Ok(Self { absolute, steps })
    }
}

/// Split a path on `/`, ignoring separators inside predicates and quotes.
/// Empty segments (leading `/`, doubled or trailing separators) are dropped.
pub fn split_segments(path: &str) -> Result<Vec<&str>, XmlError> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    for (pos, ch) in path.char_indices() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') if depth > 0 => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| XmlError::xpath(path, "unbalanced ']'"))?;
            }
            (None, '/') if depth == 0 => {
                if pos > start {
                    segments.push(&path[start..pos]);
                }
                start = pos + 1;
            }
            _ => {}
        }
    }
    if depth != 0 || quote.is_some() {
        return Err(XmlError::xpath(path, "unterminated predicate"));
    }
    if start < path.len() {
        segments.push(&path[start..]);
    }
    Ok(segments)
}

/// Path with its last step removed, or `None` when no parent step remains.
pub fn parent_path(path: &str) -> Result<Option<String>, XmlError> {
    let segments = split_segments(path)?;
    if segments.len() <= 1 {
        return Ok(None);
    }
    let prefix = if path.starts_with('/') { "/" } else { "" };
    Ok(Some(format!(
        "{prefix}{}",
        segments[..segments.len() - 1].join("/")
    )))
}

/// Element name of a segment with any predicate removed.
pub fn strip_predicate(segment: &str) -> &str {
    match segment.find('[') {
        Some(pos) => &segment[..pos],
        None => segment,
    }
}

fn parse_step(path: &str, segment: &str) -> Result<Step, XmlError> {
    match segment {
        "." => return Ok(Step::Current),
        ".." => return Ok(Step::Parent),
        _ => {}
    }
    if let Some(name) = segment.strip_prefix('@') {
        if !is_name(name) {
            return Err(XmlError::xpath(path, format!("bad attribute name '{name}'")));
        }
        return Ok(Step::Attribute(name.to_string()));
    }
    let name = strip_predicate(segment);
    if name != "*" && !is_name(name) {
        return Err(XmlError::xpath(path, format!("bad element name '{name}'")));
    }
    let predicate = match &segment[name.len()..] {
        "" => None,
        rest => {
            let inner = rest
                .strip_prefix('[')
                .and_then(|r| r.strip_suffix(']'))
                .ok_or_else(|| XmlError::xpath(path, format!("bad predicate '{rest}'")))?;
            Some(parse_predicate(path, inner.trim())?)
        }
    };
    Ok(Step::Element {
        name: name.to_string(),
        predicate,
    })
}

fn parse_predicate(path: &str, inner: &str) -> Result<Predicate, XmlError> {
    if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) {
        let position: usize = inner
            .parse()
            .map_err(|err| XmlError::xpath(path, format!("bad position: {err}")))?;
        if position == 0 {
            return Err(XmlError::xpath(path, "positions start at 1"));
        }
        return Ok(Predicate::Position(position));
    }
    let (attribute, body) = match inner.strip_prefix('@') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };
    match body.split_once('=') {
        Some((key, value)) => {
            let key = key.trim();
            let value = unquote(value.trim())
                .ok_or_else(|| XmlError::xpath(path, format!("unquoted value in '[{inner}]'")))?;
            if !is_name(key) {
                return Err(XmlError::xpath(path, format!("bad name '{key}'")));
            }
            Ok(if attribute {
                Predicate::AttributeEquals(key.to_string(), value.to_string())
            } else {
                Predicate::ChildEquals(key.to_string(), value.to_string())
            })
        }
        None if attribute && is_name(body) => Ok(Predicate::HasAttribute(body.to_string())),
        None => Err(XmlError::xpath(path, format!("unsupported predicate '[{inner}]'"))),
    }
}

fn unquote(value: &str) -> Option<&str> {
    ['\'', '"'].into_iter().find_map(|quote| {
        value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
    })
}

fn is_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_steps_and_predicates() {
        let path = LocationPath::parse("/domain/devices/disk[@device='cdrom']/target/@dev")
            .expect("parse");
        assert!(path.absolute);
        assert_eq!(
            path.steps,
            vec![
                Step::Element {
                    name: "domain".into(),
                    predicate: None
                },
                Step::Element {
                    name: "devices".into(),
                    predicate: None
                },
                Step::Element {
                    name: "disk".into(),
                    predicate: Some(Predicate::AttributeEquals("device".into(), "cdrom".into()))
                },
                Step::Element {
                    name: "target".into(),
                    predicate: None
                },
                Step::Attribute("dev".into()),
            ]
        );

        let path = LocationPath::parse("./interface[2]/..").expect("parse");
        assert!(!path.absolute);
        assert_eq!(path.steps[0], Step::Current);
        assert_eq!(
            path.steps[1],
            Step::Element {
                name: "interface".into(),
                predicate: Some(Predicate::Position(2))
            }
        );
        assert_eq!(path.steps[2], Step::Parent);
    }

    #[test]
    fn separators_inside_predicates_are_kept() {
        let segments = split_segments("devices/disk[source/@file=\"/var/a.img\"]/target").unwrap();
        assert_eq!(
            segments,
            vec!["devices", "disk[source/@file=\"/var/a.img\"]", "target"]
        );
        assert_eq!(
            parent_path("/domain/devices/disk[@path='/dev/sda']/@bus").unwrap(),
            Some("/domain/devices/disk[@path='/dev/sda']".to_string())
        );
        assert_eq!(parent_path("./source").unwrap(), Some(".".to_string()));
        assert_eq!(parent_path("/domain").unwrap(), None);
    }

    #[test]
    fn rejects_unsupported_syntax() {
        for path in ["", "disk[0]", "disk[@a=b]", "disk[", "9lives", "@a/b", "disk[name]"] {
            assert!(LocationPath::parse(path).is_err(), "{path} should fail");
        }
    }
}
