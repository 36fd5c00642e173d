//! Guest network interface device.

use std::rc::Rc;

use virt_conn::Connection;
use virt_xml::{XmlDocument, XmlNode};

use crate::{escape, ConfigError, XmlBase, XmlBuilder, XmlProperty};

pub const TYPE_NETWORK: &str = "network";
pub const TYPE_BRIDGE: &str = "bridge";
pub const TYPE_USER: &str = "user";
pub const TYPE_ETHERNET: &str = "ethernet";
pub const TYPE_DIRECT: &str = "direct";

const NET_TYPES: [&str; 5] = [TYPE_NETWORK, TYPE_BRIDGE, TYPE_USER, TYPE_ETHERNET, TYPE_DIRECT];

/// `<interface>` element of a domain.
#[derive(Debug)]
pub struct Interface {
    base: XmlBase,
    net_type: String,
    mac: Option<String>,
    model: Option<String>,
    source: Option<String>,
}

impl Interface {
    pub const NET_TYPE: XmlProperty<Self, String> =
        XmlProperty::bound("type", "./@type", |i: &Self| i.net_type.clone()).with_setter(
            |i, value| {
                if !NET_TYPES.contains(&value.as_str()) {
                    return Err(ConfigError::invalid(format!(
                        "unknown network interface type '{value}'"
                    )));
                }
                i.net_type = value;
                Ok(())
            },
        );
    pub const MAC: XmlProperty<Self, Option<String>> =
        XmlProperty::bound("mac", "./mac/@address", |i: &Self| i.mac.clone()).with_setter(
            |i, value| {
                if let Some(mac) = &value {
                    validate_mac(mac)?;
                }
                i.mac = value;
                Ok(())
            },
        );
    pub const MODEL: XmlProperty<Self, Option<String>> =
        XmlProperty::bound("model", "./model/@type", |i: &Self| i.model.clone()).with_setter(
            |i, value| {
                i.model = value;
                Ok(())
            },
        );
    /// Network name, bridge or host device, depending on the interface type.
    pub const SOURCE: XmlProperty<Self, Option<String>> =
        XmlProperty::computed("source", Self::source_xpath, |i: &Self| i.source.clone())
            .with_setter(|i, value| {
                i.source = value;
                Ok(())
            });

    pub fn new(conn: Option<Rc<dyn Connection>>) -> Self {
        Self {
            base: XmlBase::new(conn),
            net_type: TYPE_NETWORK.to_string(),
            mac: None,
            model: None,
            source: None,
        }
    }

    pub fn parse(xml: &str, conn: Option<Rc<dyn Connection>>) -> Result<Self, ConfigError> {
        Self::with_base(XmlBase::parse(xml, conn)?)
    }

    /// Edit the `<interface>` element `node` inside `doc`.
    pub fn from_node(
        doc: XmlDocument,
        node: XmlNode,
        conn: Option<Rc<dyn Connection>>,
    ) -> Result<Self, ConfigError> {
        Self::with_base(XmlBase::from_node(doc, node, conn)?)
    }

    fn with_base(base: XmlBase) -> Result<Self, ConfigError> {
        if base.root_name() != Some("interface") {
            return Err(ConfigError::invalid("expected an <interface> element"));
        }
        let mut iface = Self::new(None);
        iface.base = base;
        Ok(iface)
    }

    fn source_xpath(&self) -> Result<Option<String>, ConfigError> {
        let net_type = Self::NET_TYPE.get(self)?;
        Ok(source_attribute(&net_type).map(|attr| format!("./source/@{attr}")))
    }

    pub fn net_type(&self) -> Result<String, ConfigError> {
        Self::NET_TYPE.get(self)
    }

    pub fn set_net_type(&mut self, value: &str) -> Result<(), ConfigError> {
        Self::NET_TYPE.set(self, value.to_string())
    }

    pub fn mac(&self) -> Result<Option<String>, ConfigError> {
        Self::MAC.get(self)
    }

    pub fn set_mac(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        Self::MAC.set(self, value.map(str::to_string))
    }

    pub fn model(&self) -> Result<Option<String>, ConfigError> {
        Self::MODEL.get(self)
    }

    pub fn set_model(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        Self::MODEL.set(self, value.map(str::to_string))
    }

    pub fn source(&self) -> Result<Option<String>, ConfigError> {
        Self::SOURCE.get(self)
    }

    pub fn set_source(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        Self::SOURCE.set(self, value.map(str::to_string))
    }
}

impl XmlBuilder for Interface {
    fn base(&self) -> &XmlBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut XmlBase {
        &mut self.base
    }

    fn build_xml(&self) -> Result<String, ConfigError> {
        let mut xml = format!("<interface type='{}'>\n", escape(&self.net_type));
        if let (Some(attr), Some(source)) = (source_attribute(&self.net_type), &self.source) {
            xml.push_str(&format!("  <source {attr}='{}'/>\n", escape(source)));
        }
        if let Some(mac) = &self.mac {
            xml.push_str(&format!("  <mac address='{}'/>\n", escape(mac)));
        }
        if let Some(model) = &self.model {
            xml.push_str(&format!("  <model type='{}'/>\n", escape(model)));
        }
        xml.push_str("</interface>\n");
        Ok(xml)
    }
}

fn source_attribute(net_type: &str) -> Option<&'static str> {
    match net_type {
        TYPE_NETWORK => Some("network"),
        TYPE_BRIDGE => Some("bridge"),
        TYPE_ETHERNET | TYPE_DIRECT => Some("dev"),
        _ => None,
    }
}

/// Six colon separated hex octets, e.g. `52:54:00:12:34:56`.
pub fn validate_mac(mac: &str) -> Result<(), ConfigError> {
    let octets: Vec<&str> = mac.split(':').collect();
    let valid = octets.len() == 6
        && octets
            .iter()
            .all(|octet| octet.len() == 2 && octet.chars().all(|c| c.is_ascii_hexdigit()));
    if !valid {
        return Err(ConfigError::invalid(format!("invalid MAC address '{mac}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRIDGED: &str = "<interface type=\"bridge\">\n  <source bridge=\"br0\"/>\n  <mac address=\"52:54:00:aa:bb:cc\"/>\n</interface>";

    #[test]
    fn scratch_build() {
        let mut iface = Interface::new(None);
        iface.set_source(Some("default")).unwrap();
        iface.set_mac(Some("52:54:00:12:34:56")).unwrap();
        iface.set_model(Some("virtio")).unwrap();
        assert_eq!(iface.source().unwrap().as_deref(), Some("default"));
        assert_eq!(
            iface.get_xml_config().unwrap(),
            "<interface type='network'>\n  <source network='default'/>\n  <mac address='52:54:00:12:34:56'/>\n  <model type='virtio'/>\n</interface>\n"
        );
    }

    #[test]
    fn user_networking_has_no_source() {
        let mut iface = Interface::new(None);
        iface.set_net_type(TYPE_USER).unwrap();
        iface.set_source(Some("ignored")).unwrap();
        assert_eq!(
            iface.build_xml().unwrap(),
            "<interface type='user'>\n</interface>\n"
        );
    }

    #[test]
    fn source_path_follows_parsed_type() {
        let mut iface = Interface::parse(BRIDGED, None).unwrap();
        assert_eq!(iface.net_type().unwrap(), "bridge");
        assert_eq!(iface.source().unwrap().as_deref(), Some("br0"));
        assert_eq!(iface.mac().unwrap().as_deref(), Some("52:54:00:aa:bb:cc"));
        assert_eq!(iface.model().unwrap(), None);

        iface.set_source(Some("br1")).unwrap();
        iface.set_model(Some("e1000")).unwrap();
        assert_eq!(iface.source().unwrap().as_deref(), Some("br1"));
        assert_eq!(
            iface.get_xml_config().unwrap(),
            "<interface type=\"bridge\">\n  <model type=\"e1000\"/>\n  <source bridge=\"br1\"/>\n  <mac address=\"52:54:00:aa:bb:cc\"/>\n</interface>\n"
        );
    }

    #[test]
    fn rejects_bad_values() {
        let mut iface = Interface::new(None);
        assert!(matches!(
            iface.set_mac(Some("52:54:00:zz:00:00")),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(iface.set_net_type("token-ring").is_err());
        assert_eq!(iface.net_type().unwrap(), TYPE_NETWORK);
        assert!(Interface::parse("<disk/>", None).is_err());
    }
}
