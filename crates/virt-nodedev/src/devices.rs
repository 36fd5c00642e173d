//! Typed records, one per capability type.

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::tree::RawElement;
use crate::NodeDeviceError;

/// Copy the text of every direct child of `cap` whose tag appears in `table`.
fn copy_fields(cap: &RawElement, table: &mut [(&str, &mut Option<String>)]) {
    for child in &cap.children {
        copy_field(child, table);
    }
}

fn copy_field(child: &RawElement, table: &mut [(&str, &mut Option<String>)]) {
    if let Some((_, slot)) = table.iter_mut().find(|(tag, _)| *tag == child.name) {
        **slot = Some(child.content());
    }
}

/// `<vendor id='0x8086'>Intel</vendor>` style element.
fn copy_id_name(child: &RawElement, id: &mut Option<String>, name: &mut Option<String>) {
    *id = child.attribute("id").map(str::to_string);
    *name = Some(child.content());
}

fn parse_u64(field: &'static str, raw: &str) -> Result<u64, NodeDeviceError> {
    raw.trim()
        .parse()
        .map_err(|_| NodeDeviceError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SystemDevice {
    pub hw_vendor: Option<String>,
    pub hw_version: Option<String>,
    pub hw_serial: Option<String>,
    pub hw_uuid: Option<String>,
    pub fw_vendor: Option<String>,
    pub fw_version: Option<String>,
    pub fw_date: Option<String>,
}

impl SystemDevice {
    pub(crate) fn parse(cap: &RawElement) -> Self {
        let mut dev = Self::default();
        for child in &cap.children {
            match child.name.as_str() {
                "hardware" => copy_fields(
                    child,
                    &mut [
                        ("vendor", &mut dev.hw_vendor),
                        ("version", &mut dev.hw_version),
                        ("serial", &mut dev.hw_serial),
                        ("uuid", &mut dev.hw_uuid),
                    ],
                ),
                "firmware" => copy_fields(
                    child,
                    &mut [
                        ("vendor", &mut dev.fw_vendor),
                        ("version", &mut dev.fw_version),
                        ("release_date", &mut dev.fw_date),
                    ],
                ),
                _ => {}
            }
        }
        dev
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct NetDevice {
    pub interface: Option<String>,
    pub address: Option<String>,
    /// Type of a nested capability such as `80211` or `80203`.
    pub capability_type: Option<String>,
}

impl NetDevice {
    pub(crate) fn parse(cap: &RawElement) -> Self {
        let mut dev = Self::default();
        for child in &cap.children {
            match child.name.as_str() {
                "capability" => {
                    dev.capability_type = child.attribute("type").map(str::to_string)
                }
                _ => copy_field(
                    child,
                    &mut [
                        ("interface", &mut dev.interface),
                        ("address", &mut dev.address),
                    ],
                ),
            }
        }
        dev
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PciDevice {
    pub domain: Option<String>,
    pub bus: Option<String>,
    pub slot: Option<String>,
    pub function: Option<String>,
    pub vendor_id: Option<String>,
    pub vendor_name: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
}

impl PciDevice {
    pub(crate) fn parse(cap: &RawElement) -> Self {
        let mut dev = Self::default();
        for child in &cap.children {
            match child.name.as_str() {
                "vendor" => copy_id_name(child, &mut dev.vendor_id, &mut dev.vendor_name),
                "product" => copy_id_name(child, &mut dev.product_id, &mut dev.product_name),
                _ => copy_field(
                    child,
                    &mut [
                        ("domain", &mut dev.domain),
                        ("bus", &mut dev.bus),
                        ("slot", &mut dev.slot),
                        ("function", &mut dev.function),
                    ],
                ),
            }
        }
        dev
    }

    /// Bus address in `DDDD:BB:SS.F` notation.
    pub fn address(&self) -> String {
        format!(
            "{}:{}:{}.{}",
            hex_field(&self.domain, 4),
            hex_field(&self.bus, 2),
            hex_field(&self.slot, 2),
            hex_field(&self.function, 1),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct UsbDevice {
    pub bus: Option<String>,
    pub device: Option<String>,
    pub vendor_id: Option<String>,
    pub vendor_name: Option<String>,
    pub product_id: Option<String>,
    pub product_name: Option<String>,
}

impl UsbDevice {
    pub(crate) fn parse(cap: &RawElement) -> Self {
        let mut dev = Self::default();
        for child in &cap.children {
            match child.name.as_str() {
                "vendor" => copy_id_name(child, &mut dev.vendor_id, &mut dev.vendor_name),
                "product" => copy_id_name(child, &mut dev.product_id, &mut dev.product_name),
                _ => copy_field(
                    child,
                    &mut [("bus", &mut dev.bus), ("device", &mut dev.device)],
                ),
            }
        }
        dev
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct UsbBus {
    pub number: Option<String>,
    pub class: Option<String>,
    pub subclass: Option<String>,
    pub protocol: Option<String>,
}

impl UsbBus {
    pub(crate) fn parse(cap: &RawElement) -> Self {
        let mut dev = Self::default();
        copy_fields(
            cap,
            &mut [
                ("number", &mut dev.number),
                ("class", &mut dev.class),
                ("subclass", &mut dev.subclass),
                ("protocol", &mut dev.protocol),
            ],
        );
        dev
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct StorageDevice {
    pub block: Option<String>,
    pub bus: Option<String>,
    pub drive_type: Option<String>,
    /// Capacity in bytes.
    pub size: u64,
    pub model: Option<String>,
    pub vendor: Option<String>,
    pub removable: bool,
    pub media_available: bool,
    pub media_size: u64,
    pub hotpluggable: bool,
}

impl StorageDevice {
    pub(crate) fn parse(cap: &RawElement) -> Result<Self, NodeDeviceError> {
        let mut dev = Self::default();
        for child in &cap.children {
            match child.name.as_str() {
                "size" => dev.size = parse_u64("size", &child.content())?,
                "capability" => match child.attribute("type") {
                    Some("hotpluggable") => dev.hotpluggable = true,
                    Some("removable") => {
                        dev.removable = true;
                        for sub in &child.children {
                            match sub.name.as_str() {
                                "media_available" => {
                                    dev.media_available =
                                        parse_u64("media_available", &sub.content())? != 0
                                }
                                "media_size" => {
                                    dev.media_size = parse_u64("media_size", &sub.content())?
                                }
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                },
                _ => copy_field(
                    child,
                    &mut [
                        ("block", &mut dev.block),
                        ("bus", &mut dev.bus),
                        ("drive_type", &mut dev.drive_type),
                        ("model", &mut dev.model),
                        ("vendor", &mut dev.vendor),
                    ],
                ),
            }
        }
        Ok(dev)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ScsiBus {
    pub host: Option<String>,
}

impl ScsiBus {
    pub(crate) fn parse(cap: &RawElement) -> Self {
        let mut dev = Self::default();
        copy_fields(cap, &mut [("host", &mut dev.host)]);
        dev
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ScsiDevice {
    pub host: Option<String>,
    pub bus: Option<String>,
    pub target: Option<String>,
    pub lun: Option<String>,
    /// SCSI peripheral type reported by the host, e.g. `disk`.
    pub scsi_type: Option<String>,
}

impl ScsiDevice {
    pub(crate) fn parse(cap: &RawElement) -> Self {
        let mut dev = Self::default();
        copy_fields(
            cap,
            &mut [
                ("host", &mut dev.host),
                ("bus", &mut dev.bus),
                ("target", &mut dev.target),
                ("lun", &mut dev.lun),
                ("type", &mut dev.scsi_type),
            ],
        );
        dev
    }
}

/// Render a numeric field as zero padded hex; accepts decimal or `0x` input.
fn hex_field(raw: &Option<String>, width: usize) -> String {
    let Some(raw) = raw.as_deref().map(str::trim) else {
        return "?".repeat(width);
    };
    let value = match raw.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => raw.parse::<u32>().ok(),
    };
    match value {
        Some(value) => format!("{value:0width$x}"),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(xml: &str) -> RawElement {
        RawElement::parse(xml).expect("parse")
    }

    #[test]
    fn copy_ignores_unknown_children() {
        let bus = UsbBus::parse(&cap(
            "<capability type='usb'><number>0</number><class>9</class><vendor_ext>x</vendor_ext></capability>",
        ));
        assert_eq!(bus.number.as_deref(), Some("0"));
        assert_eq!(bus.class.as_deref(), Some("9"));
        assert!(bus.subclass.is_none());
    }

    #[test]
    fn pci_address_formatting() {
        let dev = PciDevice {
            domain: Some("0".into()),
            bus: Some("0".into()),
            slot: Some("2".into()),
            function: Some("0".into()),
            ..PciDevice::default()
        };
        assert_eq!(dev.address(), "0000:00:02.0");

        let dev = PciDevice {
            domain: Some("0x0000".into()),
            bus: Some("0x1a".into()),
            slot: Some("31".into()),
            function: Some("7".into()),
            ..PciDevice::default()
        };
        assert_eq!(dev.address(), "0000:1a:1f.7");
    }

    #[test]
    fn storage_numbers_are_strict() {
        let err = StorageDevice::parse(&cap(
            "<capability type='storage'><size>12GB</size></capability>",
        ))
        .unwrap_err();
        assert!(matches!(err, NodeDeviceError::InvalidNumber { field: "size", .. }));

        let err = StorageDevice::parse(&cap(
            "<capability type='storage'><capability type='removable'><media_size>-1</media_size></capability></capability>",
        ))
        .unwrap_err();
        assert!(matches!(err, NodeDeviceError::InvalidNumber { field: "media_size", .. }));
    }

    #[test]
    fn net_nested_capability() {
        let dev = NetDevice::parse(&cap(
            "<capability type='net'><interface>wlan0</interface><address>00:11:22:33:44:55</address><capability type='80211'/></capability>",
        ));
        assert_eq!(dev.interface.as_deref(), Some("wlan0"));
        assert_eq!(dev.address.as_deref(), Some("00:11:22:33:44:55"));
        assert_eq!(dev.capability_type.as_deref(), Some("80211"));
    }
}
