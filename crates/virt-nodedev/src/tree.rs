//! Small owned element tree built from quick-xml events.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::NodeDeviceError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RawElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<RawElement>,
}

impl RawElement {
    /// Parse a complete document and return its root element.
    ///
    /// Blank text is dropped, everything else is kept verbatim.
    pub fn parse(xml: &str) -> Result<Self, NodeDeviceError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut buf = Vec::new();
        let mut stack: Vec<RawElement> = Vec::new();
        let mut root: Option<RawElement> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => stack.push(Self::from_start(&e)?),
                Ok(Event::Empty(e)) => {
                    let element = Self::from_start(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(t)) => {
                    let text = t.unescape().map_err(xml_error)?;
                    if let Some(open) = stack.last_mut() {
                        open.text.push_str(&text);
                    }
                }
                Ok(Event::CData(t)) => {
                    if let Some(open) = stack.last_mut() {
                        open.text.push_str(&String::from_utf8_lossy(&t));
                    }
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| NodeDeviceError::Xml("unexpected closing tag".into()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Eof) => break,
                Err(err) => return Err(xml_error(err)),
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(NodeDeviceError::Xml("unclosed element at end of input".into()));
        }
        root.ok_or_else(|| NodeDeviceError::Xml("document has no root element".into()))
    }

    fn from_start(event: &BytesStart<'_>) -> Result<Self, NodeDeviceError> {
        let mut attributes = Vec::new();
        for attr in event.attributes() {
            let attr = attr.map_err(xml_error)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr.unescape_value().map_err(xml_error)?.to_string();
            attributes.push((key, value));
        }
        Ok(Self {
            name: String::from_utf8_lossy(event.name().as_ref()).to_string(),
            attributes,
            ..Self::default()
        })
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First direct child named `name`.
    pub fn child(&self, name: &str) -> Option<&RawElement> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Text of this element and all of its descendants, in document order.
    pub fn content(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.content());
        }
        out
    }
}

fn attach(
    stack: &mut [RawElement],
    root: &mut Option<RawElement>,
    element: RawElement,
) -> Result<(), NodeDeviceError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(NodeDeviceError::Xml("multiple root elements".into())),
    }
    Ok(())
}

fn xml_error<E: std::fmt::Display>(err: E) -> NodeDeviceError {
    NodeDeviceError::Xml(err.to_string())
}
