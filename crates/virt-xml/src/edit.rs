//! Path materialization and pruning.

use tracing::trace;
use xot::Node;

use crate::xpath::{self, LocationPath, Predicate, Step};
use crate::{tree_error, Target, XmlDocument, XmlError};

impl XmlDocument {
    /// Make sure every node along `path` exists, creating missing elements
    /// (and a final `@attribute`, with empty value) under `context`.
    ///
    /// Predicates select existing nodes. A created element gets the
    /// attribute or child its predicate asks for, and a positional step is
    /// created after the last sibling of the same name. Once one element has
    /// been created the rest of the path is built beneath it without further
    /// lookups. New elements copy the indentation of the first text child of
    /// their parent so hand formatted documents keep their layout.
    pub fn materialize(&mut self, context: Node, path: &str) -> Result<Target, XmlError> {
        let location = LocationPath::parse(path)?;
        let prefix = if location.absolute { "/" } else { "" };
        let mut parent = if location.absolute { None } else { Some(context) };
        let mut walked: Vec<&str> = Vec::new();
        let mut created = false;

        let segments = xpath::split_segments(path)?;
        for (segment, step) in segments.into_iter().zip(&location.steps) {
            if let Step::Attribute(attribute) = step {
                let element = parent.ok_or_else(|| XmlError::MissingRoot(path.to_string()))?;
                let name = self.xot.add_name(attribute);
                if self.xot.attributes(element).get(name).is_none() {
                    self.xot
                        .attributes_mut(element)
                        .insert(name, String::new());
                }
                return Ok(Target::Attribute { element, name });
            }

            walked.push(segment);
            let lookup = format!("{prefix}{}", walked.join("/"));
            if !created {
                if let Some(found) = self.evaluate(context, &lookup)? {
                    parent = Some(found.element());
                    continue;
                }
            }

            let element = parent.ok_or_else(|| XmlError::MissingRoot(path.to_string()))?;
            let (name, predicate) = match step {
                Step::Current => continue,
                Step::Element { name, predicate } if name.as_str() != "*" => {
                    (name.as_str(), predicate.as_ref())
                }
                _ => return Err(XmlError::xpath(path, format!("cannot create '{segment}'"))),
            };
            let node = self.create_element(element, name, predicate)?;
            parent = Some(node);
            created = true;
            trace!(path = %lookup, "materialized element");
        }

        parent
            .map(Target::Element)
            .ok_or_else(|| XmlError::MissingRoot(path.to_string()))
    }

    fn create_element(
        &mut self,
        parent: Node,
        name: &str,
        predicate: Option<&Predicate>,
    ) -> Result<Node, XmlError> {
        let last_sibling = self
            .child_elements(parent)
            .into_iter()
            .filter(|&child| self.element_name(child) == Some(name))
            .last();
        let node = match (predicate, last_sibling) {
            (Some(Predicate::Position(_)), Some(last)) => self.insert_element_after(last, name)?,
            _ => self.insert_element(parent, name)?,
        };
        match predicate {
            Some(Predicate::HasAttribute(attribute)) => {
                let attribute = self.xot.add_name(attribute);
                self.xot
                    .attributes_mut(node)
                    .insert(attribute, String::new());
            }
            Some(Predicate::AttributeEquals(attribute, value)) => {
                let attribute = self.xot.add_name(attribute);
                self.xot.attributes_mut(node).insert(attribute, value.clone());
            }
            Some(Predicate::ChildEquals(child, value)) => {
                let child = self.insert_element(node, child)?;
                self.set_content(Target::Element(child), value)?;
            }
            Some(Predicate::Position(_)) | None => {}
        }
        Ok(node)
    }

    /// Remove the node at `path` if it carries no information, then walk up
    /// the path removing ancestors that became empty.
    ///
    /// Attributes are always removed. Elements go only when they have no
    /// attributes and hold nothing but (at most) one text node. The walk stops
    /// at the first element that is kept and never removes `context` or the
    /// document element.
    pub fn prune(&mut self, context: Node, path: &str) -> Result<(), XmlError> {
        let root = self.root()?;
        let mut current = path.to_string();
        loop {
            match self.evaluate(context, &current)? {
                Some(Target::Attribute { element, name }) => {
                    self.xot.attributes_mut(element).remove(name);
                    trace!(path = %current, "pruned attribute");
                }
                Some(Target::Element(node)) => {
                    let keep_text = current != path;
                    if node == context || node == root || !self.is_prunable(node, keep_text) {
                        break;
                    }
                    if let Some(previous) = self.xot.previous_sibling(node) {
                        let blank = self
                            .xot
                            .text_str(previous)
                            .is_some_and(|text| text.trim().is_empty());
                        if blank {
                            self.xot.remove(previous).map_err(tree_error)?;
                        }
                    }
                    self.xot.remove(node).map_err(tree_error)?;
                    trace!(path = %current, "pruned element");
                }
                None => break,
            }
            match xpath::parent_path(&current)? {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Ok(())
    }

    /// An element with no attributes and at most one text child. Ancestors
    /// reached by the upward walk (`keep_text`) also need that text blank.
    fn is_prunable(&self, node: Node, keep_text: bool) -> bool {
        if self.xot.attributes(node).iter().next().is_some() {
            return false;
        }
        let mut children = self.xot.children(node);
        match (children.next(), children.next()) {
            (None, _) => true,
            (Some(only), None) => match self.xot.text_str(only) {
                Some(text) => !keep_text || text.trim().is_empty(),
                None => false,
            },
            _ => false,
        }
    }

    /// New element right after `sibling`, separated from it by a copy of the
    /// blank text that precedes `sibling`.
    fn insert_element_after(&mut self, sibling: Node, name: &str) -> Result<Node, XmlError> {
        let name = self.xot.add_name(name);
        let element = self.xot.new_element(name);
        let separator = self
            .xot
            .previous_sibling(sibling)
            .and_then(|previous| self.xot.text_str(previous))
            .filter(|text| text.trim().is_empty())
            .map(str::to_string);
        self.xot.insert_after(sibling, element).map_err(tree_error)?;
        if let Some(separator) = separator {
            let text = self.xot.new_text(&separator);
            self.xot.insert_after(sibling, text).map_err(tree_error)?;
        }
        Ok(element)
    }

    fn insert_element(&mut self, parent: Node, name: &str) -> Result<Node, XmlError> {
        let name = self.xot.add_name(name);
        let element = self.xot.new_element(name);
        let leading = self.xot.first_child(parent).and_then(|first| {
            self.xot
                .text_str(first)
                .filter(|text| !text.contains('<'))
                .map(|text| (first, text.to_string()))
        });

        match leading {
            Some((first, indent)) => {
                if self.xot.last_child(parent) == Some(first) {
                    if let Some(text) = self.xot.text_mut(first) {
                        text.set(format!("{indent}  "));
                    }
                }
                self.xot.insert_after(first, element).map_err(tree_error)?;
                let trailing = self.xot.new_text(&indent);
                self.xot
                    .insert_after(element, trailing)
                    .map_err(tree_error)?;
            }
            None => {
                self.xot.append(parent, element).map_err(tree_error)?;
                let trailing = self.xot.new_text("\n");
                self.xot.append(parent, trailing).map_err(tree_error)?;
            }
        }
        Ok(element)
    }
}
