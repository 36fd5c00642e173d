#![cfg_attr(docsrs, feature(doc_cfg))]
//! High level facade re-exporting the workspace crates, plus helpers that
//! combine them.
//!
//! ```rust
//! use std::rc::Rc;
//! use virtinst::{hostdev_for_name, Domain, MemoryConnection, XmlBuilder};
//!
//! let conn = Rc::new(MemoryConnection::new("qemu:///system").with_device(
//!     "pci_0000_00_19_0",
//!     "pci",
//!     "<device><name>pci_0000_00_19_0</name><capability type='pci'>\
//!      <domain>0</domain><bus>0</bus><slot>25</slot><function>0</function>\
//!      </capability></device>",
//! ));
//! let mut domain = Domain::new(Some(conn.clone()));
//! domain.set_name("guest1")?;
//! domain.set_memory(1024)?;
//! domain.add_hostdev(hostdev_for_name(conn, "pci_0000_00_19_0")?);
//! assert!(domain.get_xml_config()?.contains("slot='25'"));
//! # Ok::<(), virtinst::VirtinstError>(())
//! ```

pub use virt_config as config;
pub use virt_conn as conn;
pub use virt_nodedev as nodedev;
pub use virt_xml as xml;

pub use virt_config::{ConfigError, Domain, HostDevice, Interface, XmlBase, XmlBuilder, XmlProperty};
pub use virt_conn::{Connection, ConnectionError, ErrorCode, MemoryConnection};
pub use virt_nodedev::{DeviceKind, NodeDevice, NodeDeviceError};
pub use virt_xml::{XmlDocument, XmlError};

use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum VirtinstError {
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    NodeDevice(#[from] NodeDeviceError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Look up host device `name` and build the matching `<hostdev>` assignment.
pub fn hostdev_for_name(
    conn: Rc<dyn Connection>,
    name: &str,
) -> Result<HostDevice, VirtinstError> {
    let record = nodedev::lookup_node_name(conn.as_ref(), name)?;
    debug!(name, device_type = %record.device_type, "assigning host device");
    Ok(HostDevice::from_node_device(&record, Some(conn))?)
}

/// Content at `path` in `xml`, relative to the document element.
pub fn get_path(xml: &str, path: &str) -> Result<Option<String>, VirtinstError> {
    let doc = XmlDocument::parse(xml)?;
    let root = doc.root()?;
    Ok(doc.evaluate(root, path)?.map(|target| doc.content(target)))
}

/// Set the content at `path`, creating missing markup, and return the
/// sanitized document.
pub fn set_path(xml: &str, path: &str, value: &str) -> Result<String, VirtinstError> {
    let mut doc = XmlDocument::parse(xml)?;
    let root = doc.root()?;
    let target = doc.materialize(root, path)?;
    doc.set_content(target, value)?;
    Ok(doc.serialize_sanitized(root)?)
}

/// Remove the node at `path` and any ancestors left empty, returning the
/// sanitized document.
pub fn clear_path(xml: &str, path: &str) -> Result<String, VirtinstError> {
    let mut doc = XmlDocument::parse(xml)?;
    let root = doc.root()?;
    doc.prune(root, path)?;
    Ok(doc.serialize_sanitized(root)?)
}
