//! Properties bound to XPath locations.
//!
//! An [`XmlProperty`] is a `const` descriptor declared once per config type.
//! It pairs the object's plain getter and setter with an optional XPath
//! binding: when the object was parsed from XML the binding wins, otherwise
//! the plain field is used.

use tracing::trace;

use crate::{ConfigError, XmlBuilder};

/// Conversion between a property value and the raw text held in XML.
pub trait XmlValue: Sized {
    /// Decode raw node content.
    fn from_xml(raw: &str) -> Result<Self, ConfigError>;
    /// Encode for writing; `None` means the node should not exist.
    fn to_xml(&self) -> Option<String>;
    /// Value of a flag property whose node is present or absent.
    fn from_presence(_present: bool) -> Result<Self, ConfigError> {
        Err(ConfigError::invalid("flag properties must hold a boolean"))
    }
}

impl XmlValue for String {
    fn from_xml(raw: &str) -> Result<Self, ConfigError> {
        Ok(raw.to_string())
    }

    fn to_xml(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl XmlValue for Option<String> {
    fn from_xml(raw: &str) -> Result<Self, ConfigError> {
        Ok(Some(raw.to_string()))
    }

    fn to_xml(&self) -> Option<String> {
        self.clone()
    }
}

impl XmlValue for bool {
    fn from_xml(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim() {
            "yes" | "on" | "true" | "1" => Ok(true),
            "no" | "off" | "false" | "0" => Ok(false),
            other => Err(ConfigError::invalid(format!("invalid boolean '{other}'"))),
        }
    }

    fn to_xml(&self) -> Option<String> {
        self.then(|| "yes".to_string())
    }

    fn from_presence(present: bool) -> Result<Self, ConfigError> {
        Ok(present)
    }
}

macro_rules! xml_value_int {
    ($($ty:ty),*) => {$(
        impl XmlValue for $ty {
            fn from_xml(raw: &str) -> Result<Self, ConfigError> {
                parse_int(raw)
            }

            fn to_xml(&self) -> Option<String> {
                Some(self.to_string())
            }
        }

        impl XmlValue for Option<$ty> {
            fn from_xml(raw: &str) -> Result<Self, ConfigError> {
                parse_int(raw).map(Some)
            }

            fn to_xml(&self) -> Option<String> {
                self.map(|value| value.to_string())
            }
        }
    )*};
}

xml_value_int!(u32, u64);

/// Strict integer parsing; surrounding whitespace is the only slack allowed.
pub fn parse_int<T: std::str::FromStr>(raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber(raw.to_string()))
}

/// Where a bound property lives.
pub enum XPathSource<O> {
    Static(&'static str),
    /// Computed from the object, e.g. from a type attribute. `Ok(None)`
    /// leaves the property unbound for that instance.
    Computed(fn(&O) -> Result<Option<String>, ConfigError>),
}

pub enum Binding<O> {
    /// Only ever stored in memory.
    Plain,
    Bound(XPathSource<O>),
}

pub struct XmlProperty<O, T> {
    name: &'static str,
    binding: Binding<O>,
    getter: fn(&O) -> T,
    setter: Option<fn(&mut O, T) -> Result<(), ConfigError>>,
    get_converter: Option<fn(&str) -> Result<T, ConfigError>>,
    set_converter: Option<fn(&T) -> Option<String>>,
    is_bool: bool,
}

impl<O, T> XmlProperty<O, T> {
    pub const fn plain(name: &'static str, getter: fn(&O) -> T) -> Self {
        Self {
            name,
            binding: Binding::Plain,
            getter,
            setter: None,
            get_converter: None,
            set_converter: None,
            is_bool: false,
        }
    }

    pub const fn bound(name: &'static str, xpath: &'static str, getter: fn(&O) -> T) -> Self {
        Self {
            name,
            binding: Binding::Bound(XPathSource::Static(xpath)),
            getter,
            setter: None,
            get_converter: None,
            set_converter: None,
            is_bool: false,
        }
    }

    pub const fn computed(
        name: &'static str,
        xpath: fn(&O) -> Result<Option<String>, ConfigError>,
        getter: fn(&O) -> T,
    ) -> Self {
        Self {
            name,
            binding: Binding::Bound(XPathSource::Computed(xpath)),
            getter,
            setter: None,
            get_converter: None,
            set_converter: None,
            is_bool: false,
        }
    }

    pub const fn with_setter(mut self, setter: fn(&mut O, T) -> Result<(), ConfigError>) -> Self {
        self.setter = Some(setter);
        self
    }

    pub const fn with_get_converter(mut self, convert: fn(&str) -> Result<T, ConfigError>) -> Self {
        self.get_converter = Some(convert);
        self
    }

    pub const fn with_set_converter(mut self, convert: fn(&T) -> Option<String>) -> Self {
        self.set_converter = Some(convert);
        self
    }

    /// Presence of the node is the value; its content is never written.
    pub const fn flag(mut self) -> Self {
        self.is_bool = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.binding, Binding::Bound(_))
    }

    fn xpath(&self, obj: &O) -> Result<Option<String>, ConfigError> {
        match &self.binding {
            Binding::Plain => Ok(None),
            Binding::Bound(XPathSource::Static(path)) => Ok(Some((*path).to_string())),
            Binding::Bound(XPathSource::Computed(compute)) => compute(obj),
        }
    }

    /// Deleting a property is not part of the contract.
    pub fn delete(&self, _obj: &mut O) -> Result<(), ConfigError> {
        Err(ConfigError::Unsupported(self.name))
    }
}

impl<O: XmlBuilder, T: XmlValue> XmlProperty<O, T> {
    /// Raw content at the bound location, when there is one.
    fn lookup(&self, obj: &O) -> Result<Option<String>, ConfigError> {
        let Some(path) = self.xpath(obj)? else {
            return Ok(None);
        };
        let Some((doc, context)) = obj.base().document() else {
            return Ok(None);
        };
        Ok(doc.evaluate(context, &path)?.map(|target| doc.content(target)))
    }

    pub fn get(&self, obj: &O) -> Result<T, ConfigError> {
        match self.lookup(obj)? {
            Some(raw) => match self.get_converter {
                Some(convert) => convert(&raw),
                None if self.is_bool => T::from_presence(true),
                None => T::from_xml(&raw),
            },
            None if self.is_bool && obj.base().is_parse() && self.is_bound() => {
                T::from_presence(false)
            }
            None => Ok((self.getter)(obj)),
        }
    }

    /// Store `value` through the plain setter, then mirror it into the
    /// document: present values create the node, absent ones prune it.
    pub fn set(&self, obj: &mut O, value: T) -> Result<(), ConfigError> {
        let setter = self.setter.ok_or(ConfigError::ReadOnly(self.name))?;
        setter(obj, value)?;

        let stored = (self.getter)(obj);
        let raw = match self.set_converter {
            Some(convert) => convert(&stored),
            None => stored.to_xml(),
        };
        let Some(path) = self.xpath(obj)? else {
            return Ok(());
        };
        let Some((doc, context)) = obj.base_mut().document_mut() else {
            return Ok(());
        };

        match raw {
            Some(text) => {
                let target = doc.materialize(context, &path)?;
                if !self.is_bool {
                    doc.set_content(target, &text)?;
                }
                trace!(property = self.name, %path, "wrote property");
            }
            None => {
                doc.prune(context, &path)?;
                trace!(property = self.name, %path, "cleared property");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::XmlBase;

    #[derive(Debug, Default)]
    struct Disk {
        base: XmlBase,
        device: String,
        target: Option<String>,
        size: Option<u64>,
        readonly: bool,
        serial: Option<String>,
        cache: Option<String>,
        second_boot: Option<u32>,
    }

    impl XmlBuilder for Disk {
        fn base(&self) -> &XmlBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut XmlBase {
            &mut self.base
        }
    }

    impl Disk {
        const DEVICE: XmlProperty<Disk, String> =
            XmlProperty::bound("device", "./@device", |d: &Disk| d.device.clone()).with_setter(|d, v| {
                d.device = v;
                Ok(())
            });
        const TARGET: XmlProperty<Disk, Option<String>> =
            XmlProperty::bound("target", "./target/@dev", |d: &Disk| d.target.clone()).with_setter(
                |d, v| {
                    d.target = v;
                    Ok(())
                },
            );
        const SIZE: XmlProperty<Disk, Option<u64>> =
            XmlProperty::bound("size", "./size", |d: &Disk| d.size).with_setter(|d, v| {
                d.size = v;
                Ok(())
            });
        const READONLY: XmlProperty<Disk, bool> =
            XmlProperty::bound("readonly", "./readonly", |d: &Disk| d.readonly)
                .with_setter(|d, v| {
                    d.readonly = v;
                    Ok(())
                })
                .flag();
        const CACHE: XmlProperty<Disk, Option<String>> = XmlProperty::bound(
            "cache",
            "./driver[@name='qemu']/@cache",
            |d: &Disk| d.cache.clone(),
        )
        .with_setter(|d, v| {
            d.cache = v;
            Ok(())
        });
        const SECOND_BOOT: XmlProperty<Disk, Option<u32>> =
            XmlProperty::bound("second_boot", "./boot[2]/@order", |d: &Disk| d.second_boot)
                .with_setter(|d, v| {
                    d.second_boot = v;
                    Ok(())
                });
        /// Bound only once the disk has a size.
        const SIZE_UNIT: XmlProperty<Disk, Option<String>> = XmlProperty::computed(
            "size_unit",
            |d: &Disk| Ok(Disk::SIZE.get(d)?.map(|_| "./size/@unit".to_string())),
            |_: &Disk| None,
        );
        const SERIAL: XmlProperty<Disk, Option<String>> =
            XmlProperty::bound("serial", "./serial", |d: &Disk| d.serial.clone());
        const LABEL: XmlProperty<Disk, String> =
            XmlProperty::plain("label", |d: &Disk| format!("disk-{}", d.device)).with_setter(|d, v| {
                d.device = v;
                Ok(())
            });

        fn parse(xml: &str) -> Disk {
            Disk {
                base: XmlBase::parse(xml, None).expect("parse disk"),
                ..Disk::default()
            }
        }
    }

    const DISK: &str = "<disk type=\"file\" device=\"cdrom\">\n  <target dev=\"hdc\"/>\n  <readonly/>\n  <serial>ABC</serial>\n</disk>";

    #[test]
    fn scratch_values_live_in_memory() {
        let mut disk = Disk::default();
        Disk::DEVICE.set(&mut disk, "disk".into()).unwrap();
        Disk::SIZE.set(&mut disk, Some(10)).unwrap();
        Disk::READONLY.set(&mut disk, true).unwrap();
        assert_eq!(Disk::DEVICE.get(&disk).unwrap(), "disk");
        assert_eq!(Disk::SIZE.get(&disk).unwrap(), Some(10));
        assert!(Disk::READONLY.get(&disk).unwrap());
        assert_eq!(Disk::TARGET.get(&disk).unwrap(), None);
        assert_eq!(Disk::LABEL.get(&disk).unwrap(), "disk-disk");
    }

    #[test]
    fn parsed_values_come_from_document() {
        let disk = Disk::parse(DISK);
        assert_eq!(Disk::DEVICE.get(&disk).unwrap(), "cdrom");
        assert_eq!(Disk::TARGET.get(&disk).unwrap().as_deref(), Some("hdc"));
        assert_eq!(Disk::SERIAL.get(&disk).unwrap().as_deref(), Some("ABC"));
        assert!(Disk::READONLY.get(&disk).unwrap());
        // Missing node falls back to the plain field.
        assert_eq!(Disk::SIZE.get(&disk).unwrap(), None);
    }

    #[test]
    fn set_then_get_writes_through() {
        let mut disk = Disk::parse(DISK);
        Disk::TARGET.set(&mut disk, Some("sda".into())).unwrap();
        Disk::SIZE.set(&mut disk, Some(4096)).unwrap();
        assert_eq!(Disk::TARGET.get(&disk).unwrap().as_deref(), Some("sda"));
        assert_eq!(Disk::SIZE.get(&disk).unwrap(), Some(4096));
        assert_eq!(disk.target.as_deref(), Some("sda"));

        let xml = disk.get_xml_config().unwrap();
        assert!(xml.contains("<target dev=\"sda\"/>"));
        assert!(xml.contains("<size>4096</size>"));
    }

    #[test]
    fn clearing_prunes_node() {
        let mut disk = Disk::parse(DISK);
        Disk::READONLY.set(&mut disk, false).unwrap();
        assert!(!Disk::READONLY.get(&disk).unwrap());
        Disk::TARGET.set(&mut disk, None).unwrap();
        assert_eq!(Disk::TARGET.get(&disk).unwrap(), None);
        assert_eq!(
            disk.get_xml_config().unwrap(),
            "<disk type=\"file\" device=\"cdrom\">\n  <serial>ABC</serial>\n</disk>\n"
        );
    }

    #[test]
    fn flag_set_creates_empty_element() {
        let mut disk = Disk::parse("<disk>\n  <serial>ABC</serial>\n</disk>");
        assert!(!Disk::READONLY.get(&disk).unwrap());
        Disk::READONLY.set(&mut disk, true).unwrap();
        assert!(Disk::READONLY.get(&disk).unwrap());
        assert_eq!(
            disk.get_xml_config().unwrap(),
            "<disk>\n  <readonly/>\n  <serial>ABC</serial>\n</disk>\n"
        );
    }

    #[test]
    fn predicated_paths_leave_siblings_alone() {
        let mut disk = Disk::parse(
            "<disk>\n  <driver name=\"tap\" cache=\"none\"/>\n  <boot order=\"1\"/>\n</disk>",
        );
        assert_eq!(Disk::CACHE.get(&disk).unwrap(), None);
        Disk::CACHE.set(&mut disk, Some("writeback".into())).unwrap();
        Disk::SECOND_BOOT.set(&mut disk, Some(2)).unwrap();
        assert_eq!(Disk::CACHE.get(&disk).unwrap().as_deref(), Some("writeback"));
        assert_eq!(Disk::SECOND_BOOT.get(&disk).unwrap(), Some(2));
        assert_eq!(
            disk.get_xml_config().unwrap(),
            "<disk>\n  <driver name=\"qemu\" cache=\"writeback\"/>\n  <driver name=\"tap\" cache=\"none\"/>\n  <boot order=\"1\"/>\n  <boot order=\"2\"/>\n</disk>\n"
        );

        Disk::CACHE.set(&mut disk, None).unwrap();
        assert_eq!(Disk::CACHE.get(&disk).unwrap(), None);
        assert!(disk
            .get_xml_config()
            .unwrap()
            .contains("<driver name=\"tap\" cache=\"none\"/>"));
    }

    #[test]
    fn computed_path_errors_propagate() {
        let disk = Disk::parse("<disk><size unit=\"GiB\">4</size></disk>");
        assert_eq!(Disk::SIZE_UNIT.get(&disk).unwrap().as_deref(), Some("GiB"));

        let disk = Disk::parse("<disk/>");
        assert_eq!(Disk::SIZE_UNIT.get(&disk).unwrap(), None);

        let disk = Disk::parse("<disk><size unit=\"GiB\">big</size></disk>");
        let err = Disk::SIZE_UNIT.get(&disk).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber(ref raw) if raw == "big"));
    }

    #[test]
    fn contract_violations() {
        let mut disk = Disk::parse(DISK);
        let err = Disk::SERIAL.set(&mut disk, Some("X".into())).unwrap_err();
        assert!(matches!(err, ConfigError::ReadOnly("serial")));
        let err = Disk::DEVICE.delete(&mut disk).unwrap_err();
        assert!(matches!(err, ConfigError::Unsupported("device")));
        assert!(err.is_contract());
    }

    #[test]
    fn malformed_number_is_structural() {
        let disk = Disk::parse("<disk><size>big</size></disk>");
        let err = Disk::SIZE.get(&disk).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber(ref raw) if raw == "big"));
        assert!(!err.is_contract());
    }

    #[test]
    fn bool_text_values() {
        assert!(bool::from_xml("yes").unwrap());
        assert!(!bool::from_xml("off").unwrap());
        assert!(bool::from_xml("maybe").is_err());
        assert_eq!(false.to_xml(), None);
        assert!(String::from_presence(true).is_err());
    }
}
