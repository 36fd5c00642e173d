//! Host device assigned to a guest.

use std::rc::Rc;

use virt_conn::Connection;
use virt_nodedev::{DeviceKind, NodeDevice};
use virt_xml::{XmlDocument, XmlNode};

use crate::{escape, ConfigError, XmlBase, XmlBuilder, XmlProperty, XmlValue};

pub const TYPE_PCI: &str = "pci";
pub const TYPE_USB: &str = "usb";

/// `<hostdev>` element passing a PCI or USB device through to the guest.
#[derive(Debug)]
pub struct HostDevice {
    base: XmlBase,
    mode: String,
    dev_type: String,
    managed: bool,
    domain: Option<String>,
    bus: Option<String>,
    slot: Option<String>,
    function: Option<String>,
    vendor: Option<String>,
    product: Option<String>,
}

macro_rules! address_property {
    ($name:ident, $tag:literal, $xpath:literal, $field:ident) => {
        pub const $name: XmlProperty<Self, Option<String>> =
            XmlProperty::bound($tag, $xpath, |h: &Self| h.$field.clone()).with_setter(
                |h, value| {
                    h.$field = value;
                    Ok(())
                },
            );
    };
}

impl HostDevice {
    pub const MODE: XmlProperty<Self, String> =
        XmlProperty::bound("mode", "./@mode", |h: &Self| h.mode.clone());
    pub const TYPE: XmlProperty<Self, String> =
        XmlProperty::bound("type", "./@type", |h: &Self| h.dev_type.clone()).with_setter(
            |h, value| {
                if value != TYPE_PCI && value != TYPE_USB {
                    return Err(ConfigError::invalid(format!(
                        "unsupported host device type '{value}'"
                    )));
                }
                h.dev_type = value;
                Ok(())
            },
        );
    /// Whether the host driver is detached and reattached automatically.
    pub const MANAGED: XmlProperty<Self, bool> =
        XmlProperty::bound("managed", "./@managed", |h: &Self| h.managed)
            .with_setter(|h, value| {
                h.managed = value;
                Ok(())
            })
            .with_get_converter(bool::from_xml)
            .with_set_converter(|managed| Some(String::from(if *managed { "yes" } else { "no" })));

    address_property!(DOMAIN, "domain", "./source/address/@domain", domain);
    address_property!(BUS, "bus", "./source/address/@bus", bus);
    address_property!(SLOT, "slot", "./source/address/@slot", slot);
    address_property!(FUNCTION, "function", "./source/address/@function", function);
    address_property!(VENDOR, "vendor", "./source/vendor/@id", vendor);
    address_property!(PRODUCT, "product", "./source/product/@id", product);

    pub fn new(conn: Option<Rc<dyn Connection>>) -> Self {
        Self {
            base: XmlBase::new(conn),
            mode: "subsystem".to_string(),
            dev_type: TYPE_PCI.to_string(),
            managed: true,
            domain: None,
            bus: None,
            slot: None,
            function: None,
            vendor: None,
            product: None,
        }
    }

    pub fn parse(xml: &str, conn: Option<Rc<dyn Connection>>) -> Result<Self, ConfigError> {
        Self::with_base(XmlBase::parse(xml, conn)?)
    }

    pub fn from_node(
        doc: XmlDocument,
        node: XmlNode,
        conn: Option<Rc<dyn Connection>>,
    ) -> Result<Self, ConfigError> {
        Self::with_base(XmlBase::from_node(doc, node, conn)?)
    }

    fn with_base(base: XmlBase) -> Result<Self, ConfigError> {
        if base.root_name() != Some("hostdev") {
            return Err(ConfigError::invalid("expected a <hostdev> element"));
        }
        let mut dev = Self::new(None);
        dev.base = base;
        Ok(dev)
    }

    /// Assignment for a host device record, PCI or USB only.
    pub fn from_node_device(
        device: &NodeDevice,
        conn: Option<Rc<dyn Connection>>,
    ) -> Result<Self, ConfigError> {
        let mut dev = Self::new(conn);
        match &device.kind {
            DeviceKind::Pci(pci) => {
                dev.set_type(TYPE_PCI)?;
                Self::DOMAIN.set(&mut dev, pci.domain.clone())?;
                Self::BUS.set(&mut dev, pci.bus.clone())?;
                Self::SLOT.set(&mut dev, pci.slot.clone())?;
                Self::FUNCTION.set(&mut dev, pci.function.clone())?;
            }
            DeviceKind::UsbDevice(usb) => {
                dev.set_type(TYPE_USB)?;
                Self::VENDOR.set(&mut dev, usb.vendor_id.clone())?;
                Self::PRODUCT.set(&mut dev, usb.product_id.clone())?;
            }
            _ => {
                return Err(ConfigError::invalid(format!(
                    "host device '{}' of type '{}' cannot be assigned to a guest",
                    device.name.as_deref().unwrap_or("?"),
                    device.device_type
                )))
            }
        }
        Ok(dev)
    }

    pub fn mode(&self) -> Result<String, ConfigError> {
        Self::MODE.get(self)
    }

    pub fn dev_type(&self) -> Result<String, ConfigError> {
        Self::TYPE.get(self)
    }

    pub fn set_type(&mut self, value: &str) -> Result<(), ConfigError> {
        Self::TYPE.set(self, value.to_string())
    }

    pub fn managed(&self) -> Result<bool, ConfigError> {
        Self::MANAGED.get(self)
    }

    pub fn set_managed(&mut self, value: bool) -> Result<(), ConfigError> {
        Self::MANAGED.set(self, value)
    }

    /// PCI address as `(domain, bus, slot, function)`.
    pub fn pci_address(
        &self,
    ) -> Result<(Option<String>, Option<String>, Option<String>, Option<String>), ConfigError> {
        Ok((
            Self::DOMAIN.get(self)?,
            Self::BUS.get(self)?,
            Self::SLOT.get(self)?,
            Self::FUNCTION.get(self)?,
        ))
    }

    /// USB ids as `(vendor, product)`.
    pub fn usb_ids(&self) -> Result<(Option<String>, Option<String>), ConfigError> {
        Ok((Self::VENDOR.get(self)?, Self::PRODUCT.get(self)?))
    }
}

impl XmlBuilder for HostDevice {
    fn base(&self) -> &XmlBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut XmlBase {
        &mut self.base
    }

    fn build_xml(&self) -> Result<String, ConfigError> {
        let mut xml = format!(
            "<hostdev mode='{}' type='{}' managed='{}'>\n  <source>\n",
            escape(&self.mode),
            escape(&self.dev_type),
            if self.managed { "yes" } else { "no" }
        );
        if self.dev_type == TYPE_USB {
            let (Some(vendor), Some(product)) = (&self.vendor, &self.product) else {
                return Err(ConfigError::invalid("USB host device needs vendor and product ids"));
            };
            xml.push_str(&format!(
                "    <vendor id='{}'/>\n    <product id='{}'/>\n",
                escape(vendor),
                escape(product)
            ));
        } else {
            let mut address = String::from("    <address");
            for (attr, value) in [
                ("domain", &self.domain),
                ("bus", &self.bus),
                ("slot", &self.slot),
                ("function", &self.function),
            ] {
                if let Some(value) = value {
                    address.push_str(&format!(" {attr}='{}'", escape(value)));
                }
            }
            address.push_str("/>\n");
            xml.push_str(&address);
        }
        xml.push_str("  </source>\n</hostdev>\n");
        Ok(xml)
    }
}
