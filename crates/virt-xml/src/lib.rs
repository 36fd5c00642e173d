#![cfg_attr(docsrs, feature(doc_cfg))]
//! Editable XML documents addressed by XPath-like location paths.
//!
//! [`XmlDocument`] owns a parsed tree and offers the handful of operations
//! configuration objects need: resolve a path, read or replace the content at
//! that location, create every missing element along a path
//! ([`XmlDocument::materialize`]) and remove emptied markup again
//! ([`XmlDocument::prune`]).
//!
//! ```rust
//! use virt_xml::XmlDocument;
//!
//! let mut doc = XmlDocument::parse("<domain>\n  <name>demo</name>\n</domain>")?;
//! let root = doc.root()?;
//! let target = doc.materialize(root, "./memory")?;
//! doc.set_content(target, "524288")?;
//! assert_eq!(
//!     doc.serialize(root)?,
//!     "<domain>\n  <memory>524288</memory>\n  <name>demo</name>\n</domain>"
//! );
//! # Ok::<(), virt_xml::XmlError>(())
//! ```

mod edit;
pub mod xpath;

use std::fmt;

use thiserror::Error;
use tracing::debug;
use xot::{NameId, Node, Xot};

pub use xot::Node as XmlNode;
pub use xpath::{LocationPath, Predicate, Step};

/// Error type produced by document operations.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The markup could not be parsed.
    #[error("xml: {0}")]
    Xml(String),
    /// The location path is not part of the supported XPath subset.
    #[error("invalid xpath '{path}': {reason}")]
    XPath { path: String, reason: String },
    /// A path had to be created but there was no element to attach it to.
    #[error("could not find XML root node for '{0}'")]
    MissingRoot(String),
    /// The underlying tree refused a manipulation.
    #[error("tree: {0}")]
    Tree(String),
}

impl XmlError {
    pub(crate) fn xpath<S: Into<String>>(path: &str, reason: S) -> Self {
        XmlError::XPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

fn tree_error(err: xot::Error) -> XmlError {
    XmlError::Tree(err.to_string())
}

/// Location a path resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// An element node.
    Element(Node),
    /// An attribute held by `element`.
    Attribute { element: Node, name: NameId },
}

impl Target {
    /// Element that owns the target (the element itself, or the attribute's holder).
    pub fn element(self) -> Node {
        match self {
            Target::Element(node) => node,
            Target::Attribute { element, .. } => element,
        }
    }
}

/// Owned XML tree.
pub struct XmlDocument {
    xot: Xot,
    document: Node,
}

impl fmt::Debug for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlDocument")
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

impl XmlDocument {
    /// Parse `xml` into a new document.
    ///
    /// Whitespace text is kept as-is so re-serializing an unmodified document
    /// reproduces its layout. Parse errors are returned from this call only;
    /// no error state outlives it.
    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        let mut xot = Xot::new();
        let document = xot
            .parse(xml)
            .map_err(|err| XmlError::Xml(err.to_string()))?;
        debug!(len = xml.len(), "parsed xml document");
        Ok(Self { xot, document })
    }

    /// Document element of the tree.
    pub fn root(&self) -> Result<Node, XmlError> {
        self.xot
            .children(self.document)
            .find(|&node| self.xot.is_element(node))
            .ok_or_else(|| XmlError::Xml("document has no root element".into()))
    }

    /// Local name of an element node.
    pub fn element_name(&self, node: Node) -> Option<&str> {
        self.xot
            .element(node)
            .map(|element| self.xot.local_name_str(element.name()))
    }

    /// Value of attribute `name` on `node`.
    pub fn attribute(&self, node: Node, name: &str) -> Option<String> {
        let name = self.xot.name(name)?;
        self.xot.attributes(node).get(name).cloned()
    }

    /// Whether `node` is an element of this document's tree. Nodes are only
    /// compared, never dereferenced, so handles from another document are safe
    /// to pass.
    pub fn owns_element(&self, node: Node) -> bool {
        self.xot
            .descendants(self.document)
            .any(|own| own == node && self.xot.is_element(own))
    }

    /// Direct element children of `node`, in document order.
    pub fn child_elements(&self, node: Node) -> Vec<Node> {
        self.xot
            .children(node)
            .filter(|&child| self.xot.is_element(child))
            .collect()
    }

    /// Resolve `path` against `context`, returning the first match.
    pub fn evaluate(&self, context: Node, path: &str) -> Result<Option<Target>, XmlError> {
        let location = LocationPath::parse(path)?;
        Ok(self.select(context, &location))
    }

    /// Text content at `target`: the concatenated descendant text of an
    /// element, or the value of an attribute.
    pub fn content(&self, target: Target) -> String {
        match target {
            Target::Element(node) => self
                .xot
                .descendants(node)
                .filter_map(|child| self.xot.text_str(child))
                .collect(),
            Target::Attribute { element, name } => self
                .xot
                .attributes(element)
                .get(name)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Replace the content at `target` with `value`.
    ///
    /// Element children are discarded and replaced by a single text node.
    pub fn set_content(&mut self, target: Target, value: &str) -> Result<(), XmlError> {
        match target {
            Target::Element(node) => {
                let children: Vec<Node> = self.xot.children(node).collect();
                for child in children {
                    self.xot.remove(child).map_err(tree_error)?;
                }
                if !value.is_empty() {
                    let text = self.xot.new_text(value);
                    self.xot.append(node, text).map_err(tree_error)?;
                }
            }
            Target::Attribute { element, name } => {
                self.xot
                    .attributes_mut(element)
                    .insert(name, value.to_string());
            }
        }
        Ok(())
    }

    /// Serialize the subtree rooted at `node` exactly as it is held.
    pub fn serialize(&self, node: Node) -> Result<String, XmlError> {
        self.xot.to_string(node).map_err(tree_error)
    }

    /// Serialize the subtree rooted at `node` and normalise it with [`sanitize`].
    pub fn serialize_sanitized(&self, node: Node) -> Result<String, XmlError> {
        self.serialize(node).map(|xml| sanitize(&xml))
    }

    fn select(&self, context: Node, location: &LocationPath) -> Option<Target> {
        let mut current = vec![if location.absolute {
            self.document
        } else {
            context
        }];
        for step in &location.steps {
            match step {
                Step::Current => {}
                Step::Parent => {
                    let mut parents = Vec::new();
                    for node in &current {
                        if let Some(parent) = self.xot.parent(*node) {
                            if !parents.contains(&parent) {
                                parents.push(parent);
                            }
                        }
                    }
                    current = parents;
                }
                Step::Element { name, predicate } => {
                    let mut matched = Vec::new();
                    for node in &current {
                        let candidates = self
                            .child_elements(*node)
                            .into_iter()
                            .filter(|&child| name == "*" || self.element_name(child) == Some(name.as_str()));
                        let selected: Vec<Node> = match predicate {
                            Some(Predicate::Position(position)) => {
                                candidates.skip(position - 1).take(1).collect()
                            }
                            Some(predicate) => candidates
                                .filter(|&child| self.matches(child, predicate))
                                .collect(),
                            None => candidates.collect(),
                        };
                        matched.extend(selected);
                    }
                    current = matched;
                }
                Step::Attribute(name) => {
                    let name = self.xot.name(name)?;
                    return current
                        .into_iter()
                        .find(|&node| self.xot.attributes(node).get(name).is_some())
                        .map(|element| Target::Attribute { element, name });
                }
            }
            if current.is_empty() {
                return None;
            }
        }
        current
            .into_iter()
            .find(|&node| self.xot.is_element(node))
            .map(Target::Element)
    }

    fn matches(&self, node: Node, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::Position(_) => true,
            Predicate::HasAttribute(name) => self.attribute(node, name).is_some(),
            Predicate::AttributeEquals(name, value) => {
                self.attribute(node, name).as_deref() == Some(value.as_str())
            }
            Predicate::ChildEquals(name, value) => self.child_elements(node).into_iter().any(
                |child| {
                    self.element_name(child) == Some(name.as_str())
                        && self.content(Target::Element(child)) == *value
                },
            ),
        }
    }
}

/// Normalise serialized markup: drop a leading `<?...?>` declaration line and
/// make sure the text ends with a newline.
pub fn sanitize(xml: &str) -> String {
    let body = if xml.starts_with("<?") {
        xml.split_once('\n').map(|(_, rest)| rest).unwrap_or("")
    } else {
        xml
    };
    let mut out = body.to_string();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "<domain type=\"kvm\">\n  <name>demo</name>\n  <devices>\n    <disk type=\"file\" device=\"disk\">\n      <target dev=\"vda\"/>\n    </disk>\n    <disk type=\"file\" device=\"cdrom\">\n      <target dev=\"hdc\"/>\n    </disk>\n  </devices>\n</domain>";

    #[test]
    fn round_trip_is_byte_identical() {
        let doc = XmlDocument::parse(DOMAIN).expect("parse");
        let root = doc.root().expect("root");
        assert_eq!(doc.serialize(root).expect("serialize"), DOMAIN);
        assert_eq!(doc.element_name(root), Some("domain"));
        assert_eq!(doc.attribute(root, "type").as_deref(), Some("kvm"));
    }

    #[test]
    fn evaluate_absolute_and_relative_paths() {
        let doc = XmlDocument::parse(DOMAIN).expect("parse");
        let root = doc.root().expect("root");

        let name = doc.evaluate(root, "/domain/name").unwrap().expect("absolute");
        assert_eq!(doc.content(name), "demo");
        let name = doc.evaluate(root, "./name").unwrap().expect("relative");
        assert_eq!(doc.content(name), "demo");
        assert!(doc.evaluate(root, "/device/name").unwrap().is_none());

        let kind = doc.evaluate(root, "./@type").unwrap().expect("attribute");
        assert_eq!(doc.content(kind), "kvm");
        assert!(doc.evaluate(root, "./@missing").unwrap().is_none());
    }

    #[test]
    fn evaluate_predicates() {
        let doc = XmlDocument::parse(DOMAIN).expect("parse");
        let root = doc.root().expect("root");

        let cdrom = doc
            .evaluate(root, "./devices/disk[@device='cdrom']/target/@dev")
            .unwrap()
            .expect("cdrom target");
        assert_eq!(doc.content(cdrom), "hdc");

        let first = doc
            .evaluate(root, "devices/disk[1]/target/@dev")
            .unwrap()
            .expect("first disk");
        assert_eq!(doc.content(first), "vda");

        let second = doc
            .evaluate(root, "devices/*[2]/@device")
            .unwrap()
            .expect("second device");
        assert_eq!(doc.content(second), "cdrom");

        let by_child = doc
            .evaluate(root, "/domain[name='demo']/@type")
            .unwrap()
            .expect("child predicate");
        assert_eq!(doc.content(by_child), "kvm");

        let up = doc
            .evaluate(root, "devices/disk/../../name")
            .unwrap()
            .expect("parent steps");
        assert_eq!(doc.content(up), "demo");
    }

    #[test]
    fn invalid_path_is_rejected() {
        let doc = XmlDocument::parse(DOMAIN).expect("parse");
        let root = doc.root().expect("root");
        let err = doc.evaluate(root, "devices/disk[").unwrap_err();
        assert!(matches!(err, XmlError::XPath { .. }));
        let err = doc.evaluate(root, "@type/name").unwrap_err();
        assert!(matches!(err, XmlError::XPath { .. }));
    }

    #[test]
    fn malformed_markup_fails_to_parse() {
        let err = XmlDocument::parse("<domain><name>x</domain>").unwrap_err();
        assert!(matches!(err, XmlError::Xml(_)));
    }

    #[test]
    fn set_content_replaces_children() {
        let mut doc = XmlDocument::parse(DOMAIN).expect("parse");
        let root = doc.root().expect("root");
        let name = doc.evaluate(root, "name").unwrap().expect("name");
        doc.set_content(name, "renamed").expect("set");
        assert_eq!(doc.content(name), "renamed");

        let dev = doc
            .evaluate(root, "devices/disk[1]/target/@dev")
            .unwrap()
            .expect("dev");
        doc.set_content(dev, "sda").expect("set attribute");
        let serialized = doc.serialize(root).expect("serialize");
        assert!(serialized.contains("<name>renamed</name>"));
        assert!(serialized.contains("<target dev=\"sda\"/>"));
    }

    #[test]
    fn sanitize_strips_declaration_and_terminates() {
        assert_eq!(
            sanitize("<?xml version=\"1.0\"?>\n<a>\n</a>"),
            "<a>\n</a>\n"
        );
        assert_eq!(sanitize("<a/>"), "<a/>\n");
        assert_eq!(sanitize("<a/>\n"), "<a/>\n");
    }
}
