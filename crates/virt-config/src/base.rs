//! State shared by every config object.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;
use virt_conn::{is_uri_remote, Capabilities, Connection};
use virt_xml::{XmlDocument, XmlNode};

use crate::ConfigError;

/// Optional backing document plus the connection the object was created for.
///
/// Capabilities and the remote classification are fetched on first use and
/// then kept for the lifetime of the object.
#[derive(Default)]
pub struct XmlBase {
    context: Option<(XmlDocument, XmlNode)>,
    conn: Option<Rc<dyn Connection>>,
    caps: OnceCell<Option<Capabilities>>,
    remote: OnceCell<bool>,
}

impl fmt::Debug for XmlBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlBase")
            .field("context", &self.context)
            .field("connected", &self.conn.is_some())
            .finish_non_exhaustive()
    }
}

impl XmlBase {
    /// Scratch mode: no document, fields live in memory.
    pub fn new(conn: Option<Rc<dyn Connection>>) -> Self {
        Self {
            conn,
            ..Self::default()
        }
    }

    /// Parse `xml` and root property lookups at its document element.
    pub fn parse(xml: &str, conn: Option<Rc<dyn Connection>>) -> Result<Self, ConfigError> {
        let doc = XmlDocument::parse(xml)?;
        let root = doc.root()?;
        Self::from_node(doc, root, conn)
    }

    /// Adopt `doc`, rooting property lookups at `node`, which must be one of
    /// its elements.
    pub fn from_node(
        doc: XmlDocument,
        node: XmlNode,
        conn: Option<Rc<dyn Connection>>,
    ) -> Result<Self, ConfigError> {
        if !doc.owns_element(node) {
            return Err(ConfigError::invalid(
                "context node is not an element of the document",
            ));
        }
        Ok(Self {
            context: Some((doc, node)),
            conn,
            ..Self::default()
        })
    }

    /// Whether the object is backed by parsed XML.
    pub fn is_parse(&self) -> bool {
        self.context.is_some()
    }

    pub fn document(&self) -> Option<(&XmlDocument, XmlNode)> {
        self.context.as_ref().map(|(doc, node)| (doc, *node))
    }

    pub fn document_mut(&mut self) -> Option<(&mut XmlDocument, XmlNode)> {
        self.context.as_mut().map(|(doc, node)| (doc, *node))
    }

    /// Element name of the context node.
    pub fn root_name(&self) -> Option<&str> {
        self.document().and_then(|(doc, node)| doc.element_name(node))
    }

    pub fn connection(&self) -> Option<&Rc<dyn Connection>> {
        self.conn.as_ref()
    }

    /// Replace the connection. Values cached from a previous connection are
    /// kept.
    pub fn set_connection(&mut self, conn: Option<Rc<dyn Connection>>) {
        self.conn = conn;
    }

    pub fn uri(&self) -> Result<Option<String>, ConfigError> {
        match &self.conn {
            Some(conn) => Ok(Some(conn.uri()?)),
            None => Ok(None),
        }
    }

    /// Host capabilities of the connection, fetched once.
    pub fn capabilities(&self) -> Result<Option<&Capabilities>, ConfigError> {
        if let Some(caps) = self.caps.get() {
            return Ok(caps.as_ref());
        }
        let fetched = match &self.conn {
            Some(conn) => {
                let caps = Capabilities::parse(&conn.capabilities_xml()?)?;
                debug!(guests = caps.guests.len(), "fetched connection capabilities");
                Some(caps)
            }
            None => None,
        };
        Ok(self.caps.get_or_init(|| fetched).as_ref())
    }

    /// Whether the connection points at another host, computed once.
    pub fn is_remote(&self) -> Result<bool, ConfigError> {
        if let Some(remote) = self.remote.get() {
            return Ok(*remote);
        }
        let remote = match self.uri()? {
            Some(uri) => is_uri_remote(&uri),
            None => false,
        };
        Ok(*self.remote.get_or_init(|| remote))
    }
}

/// Config objects: access to the shared base plus XML rendering.
pub trait XmlBuilder {
    fn base(&self) -> &XmlBase;
    fn base_mut(&mut self) -> &mut XmlBase;

    /// Render the object from its in-memory fields.
    fn build_xml(&self) -> Result<String, ConfigError> {
        Err(ConfigError::NotImplemented(std::any::type_name::<Self>()))
    }

    /// XML for the object: the edited document when parsed, freshly built
    /// markup otherwise.
    fn get_xml_config(&self) -> Result<String, ConfigError> {
        match self.base().document() {
            Some((doc, node)) => Ok(doc.serialize_sanitized(node)?),
            None => self.build_xml(),
        }
    }
}

pub fn check_str_nonempty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Names may only hold letters, digits and `_ - . +`.
pub fn check_name(field: &str, value: &str) -> Result<(), ConfigError> {
    check_str_nonempty(field, value)?;
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '+')))
    {
        return Err(ConfigError::invalid(format!(
            "{field} '{value}' contains invalid character '{bad}'"
        )));
    }
    Ok(())
}
