#![cfg_attr(docsrs, feature(doc_cfg))]
//! Host device records parsed from node device XML.
//!
//! A node device document has a `device` root with `name`, `parent` and a
//! single `capability` element whose `type` attribute selects the record:
//!
//! ```
//! use virt_nodedev::{parse, DeviceKind};
//!
//! let dev = parse(
//!     "<device><name>pci_0000_00_02_0</name>\
//!      <capability type='pci'><domain>0</domain><bus>0</bus><slot>2</slot>\
//!      <function>0</function><vendor id='0x8086'>Intel</vendor>\
//!      <product id='0x0046'>Integrated Graphics</product></capability></device>",
//! )?;
//! let DeviceKind::Pci(pci) = &dev.kind else { unreachable!() };
//! assert_eq!(pci.vendor_id.as_deref(), Some("0x8086"));
//! assert_eq!(dev.pretty_name(), "0000:00:02.0 Intel Integrated Graphics");
//! # Ok::<(), virt_nodedev::NodeDeviceError>(())
//! ```

mod devices;
mod tree;

#[cfg(feature = "serde")]
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};
use virt_conn::{Connection, ConnectionError};

pub use devices::{
    NetDevice, PciDevice, ScsiBus, ScsiDevice, StorageDevice, SystemDevice, UsbBus, UsbDevice,
};

use tree::RawElement;

pub const CAPABILITY_TYPE_SYSTEM: &str = "system";
pub const CAPABILITY_TYPE_NET: &str = "net";
pub const CAPABILITY_TYPE_PCI: &str = "pci";
pub const CAPABILITY_TYPE_USBDEV: &str = "usb_device";
pub const CAPABILITY_TYPE_USBBUS: &str = "usb";
pub const CAPABILITY_TYPE_STORAGE: &str = "storage";
pub const CAPABILITY_TYPE_SCSIBUS: &str = "scsi_host";
pub const CAPABILITY_TYPE_SCSIDEV: &str = "scsi";

#[derive(Debug, Error)]
pub enum NodeDeviceError {
    #[error("xml: {0}")]
    Xml(String),
    #[error("root element '{0}' is not a device description")]
    InvalidRoot(String),
    #[error("unknown host device capability '{0}'")]
    UnknownCapability(String),
    #[error("invalid integer for {field}: '{value}'")]
    InvalidNumber { field: &'static str, value: String },
    #[error("connection does not support host device enumeration")]
    Unsupported,
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl NodeDeviceError {
    /// `true` for errors caused by the document itself.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Xml(_) | Self::InvalidRoot(_) | Self::UnknownCapability(_) | Self::InvalidNumber { .. }
        )
    }
}

/// Per-capability payload of a [`NodeDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DeviceKind {
    System(SystemDevice),
    Net(NetDevice),
    Pci(PciDevice),
    UsbDevice(UsbDevice),
    UsbBus(UsbBus),
    Storage(StorageDevice),
    ScsiBus(ScsiBus),
    ScsiDevice(ScsiDevice),
}

/// Immutable snapshot of one host device.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct NodeDevice {
    pub name: Option<String>,
    pub parent: Option<String>,
    /// Capability discriminant this record was dispatched on.
    pub device_type: String,
    pub kind: DeviceKind,
}

impl NodeDevice {
    /// Human readable label, as shown by device pickers.
    pub fn pretty_name(&self) -> String {
        let fallback = || self.name.clone().unwrap_or_else(|| self.device_type.clone());
        let label = match &self.kind {
            DeviceKind::Pci(pci) => join(&[
                Some(pci.address()),
                pci.vendor_name.clone(),
                pci.product_name.clone(),
            ]),
            DeviceKind::UsbDevice(usb) => join(&[
                Some(format!(
                    "{}:{}",
                    zero_padded(&usb.bus, 3),
                    zero_padded(&usb.device, 3)
                )),
                usb.vendor_name.clone(),
                usb.product_name.clone(),
            ]),
            DeviceKind::Net(net) => match (&net.interface, &net.address) {
                (Some(iface), Some(addr)) => format!("{iface} ({addr})"),
                (Some(iface), None) => iface.clone(),
                _ => String::new(),
            },
            DeviceKind::Storage(storage) => join(&[
                storage.block.clone(),
                storage.vendor.clone(),
                storage.model.clone(),
            ]),
            DeviceKind::System(system) => {
                join(&[system.hw_vendor.clone(), system.hw_version.clone()])
            }
            DeviceKind::UsbBus(_) | DeviceKind::ScsiBus(_) | DeviceKind::ScsiDevice(_) => {
                String::new()
            }
        };
        if label.is_empty() {
            fallback()
        } else {
            label
        }
    }
}

fn join(parts: &[Option<String>]) -> String {
    parts
        .iter()
        .flatten()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn zero_padded(raw: &Option<String>, width: usize) -> String {
    match raw.as_deref().map(|s| s.trim().parse::<u32>()) {
        Some(Ok(value)) => format!("{value:0width$}"),
        _ => raw.clone().unwrap_or_else(|| "?".repeat(width)),
    }
}

/// Parse a node device XML document into its typed record.
pub fn parse(xml: &str) -> Result<NodeDevice, NodeDeviceError> {
    let root = RawElement::parse(xml)?;
    if root.name != "device" {
        return Err(NodeDeviceError::InvalidRoot(root.name));
    }

    let cap = root
        .child("capability")
        .ok_or_else(|| NodeDeviceError::UnknownCapability("none".into()))?;
    let device_type = cap.attribute("type").unwrap_or_default().to_string();
    trace!(%device_type, "dispatching node device");

    let kind = match device_type.as_str() {
        CAPABILITY_TYPE_SYSTEM => DeviceKind::System(SystemDevice::parse(cap)),
        CAPABILITY_TYPE_NET => DeviceKind::Net(NetDevice::parse(cap)),
        CAPABILITY_TYPE_PCI => DeviceKind::Pci(PciDevice::parse(cap)),
        CAPABILITY_TYPE_USBDEV => DeviceKind::UsbDevice(UsbDevice::parse(cap)),
        CAPABILITY_TYPE_USBBUS => DeviceKind::UsbBus(UsbBus::parse(cap)),
        CAPABILITY_TYPE_STORAGE => DeviceKind::Storage(StorageDevice::parse(cap)?),
        CAPABILITY_TYPE_SCSIBUS => DeviceKind::ScsiBus(ScsiBus::parse(cap)),
        CAPABILITY_TYPE_SCSIDEV => DeviceKind::ScsiDevice(ScsiDevice::parse(cap)),
        _ => return Err(NodeDeviceError::UnknownCapability(device_type)),
    };

    let name = root.child("name").map(RawElement::content);
    debug!(name = ?name, %device_type, "parsed node device");
    Ok(NodeDevice {
        name,
        parent: root.child("parent").map(RawElement::content),
        device_type,
        kind,
    })
}

/// Whether `conn` can enumerate host devices.
pub fn is_nodedev_capable(conn: &dyn Connection) -> Result<bool, NodeDeviceError> {
    supported(conn.list_devices(None).map(|_| true))
}

/// Whether `conn` can detach and reset PCI devices.
pub fn is_pci_detach_capable(conn: &dyn Connection) -> Result<bool, NodeDeviceError> {
    supported(conn.node_device_detach_supported())
}

fn supported(result: Result<bool, ConnectionError>) -> Result<bool, NodeDeviceError> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_unsupported() => {
            debug!(error = %err, "host device call not supported");
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

/// Fetch and parse the host device `name`.
pub fn lookup_node_name(conn: &dyn Connection, name: &str) -> Result<NodeDevice, NodeDeviceError> {
    if !is_nodedev_capable(conn)? {
        return Err(NodeDeviceError::Unsupported);
    }
    parse(&conn.device_xml(name)?)
}

/// Parse every host device, optionally restricted to one capability type.
pub fn list_node_devices(
    conn: &dyn Connection,
    capability: Option<&str>,
) -> Result<Vec<NodeDevice>, NodeDeviceError> {
    conn.list_devices(capability)?
        .iter()
        .map(|name| parse(&conn.device_xml(name)?))
        .collect()
}
