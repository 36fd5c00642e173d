#![cfg_attr(docsrs, feature(doc_cfg))]
//! Configuration objects whose fields are bound to locations in an XML
//! document.
//!
//! An object built from scratch stores its fields in memory and renders
//! fresh XML on request. An object parsed from existing XML reads and writes
//! its fields straight through to the document, creating or removing markup
//! as needed, and serializes the edited document so that everything it does
//! not model survives untouched.
//!
//! ```
//! use virt_config::{Domain, XmlBuilder};
//!
//! let mut domain = Domain::parse(
//!     "<domain type=\"kvm\">\n  <name>demo</name>\n  <memory>524288</memory>\n</domain>",
//!     None,
//! )?;
//! assert_eq!(domain.memory()?, 512);
//! domain.set_memory(1024)?;
//! domain.set_acpi(true)?;
//! assert!(domain.get_xml_config()?.contains("<memory>1048576</memory>"));
//! # Ok::<(), virt_config::ConfigError>(())
//! ```

pub mod base;
pub mod domain;
pub mod hostdev;
pub mod interface;
pub mod property;

use thiserror::Error;
use virt_conn::{CapsError, ConnectionError};
use virt_xml::XmlError;

pub use base::{check_name, check_str_nonempty, XmlBase, XmlBuilder};
pub use domain::Domain;
pub use hostdev::HostDevice;
pub use interface::Interface;
pub use property::{Binding, XPathSource, XmlProperty, XmlValue};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error("capabilities: {0}")]
    Capabilities(#[from] CapsError),
    #[error("invalid integer '{0}'")]
    InvalidNumber(String),
    #[error("{0}")]
    InvalidValue(String),
    /// A config type was serialized from scratch without providing `build_xml`.
    #[error("{0} does not implement build_xml")]
    NotImplemented(&'static str),
    #[error("property '{0}' is read-only")]
    ReadOnly(&'static str),
    #[error("property '{0}' cannot be deleted")]
    Unsupported(&'static str),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl ConfigError {
    /// `true` for misuse of the property API rather than bad data.
    pub fn is_contract(&self) -> bool {
        matches!(
            self,
            Self::NotImplemented(_) | Self::ReadOnly(_) | Self::Unsupported(_)
        )
    }

    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidValue(msg.into())
    }
}

/// Escape text for use in element content or a quoted attribute.
pub(crate) fn escape(text: &str) -> String {
    quick_xml::escape::escape(text).into_owned()
}

/// Indent every non-empty line of `text` by `width` spaces.
pub(crate) fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}\n")
            }
        })
        .collect()
}
