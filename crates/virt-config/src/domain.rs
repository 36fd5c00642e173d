//! Guest domain definition.

use std::rc::Rc;

use tracing::debug;
use virt_conn::Connection;

use crate::property::parse_int;
use crate::{
    check_name, escape, indent, ConfigError, HostDevice, Interface, XmlBase, XmlBuilder,
    XmlProperty,
};

/// Top level `<domain>` document.
///
/// Devices added with [`Domain::add_interface`] and [`Domain::add_hostdev`]
/// are only rendered by [`XmlBuilder::build_xml`]; a parsed domain keeps the
/// devices its document already holds.
#[derive(Debug)]
pub struct Domain {
    base: XmlBase,
    domain_type: String,
    name: String,
    uuid: Option<String>,
    description: Option<String>,
    memory: u64,
    vcpus: u32,
    os_type: String,
    emulator: Option<String>,
    acpi: bool,
    apic: bool,
    pae: bool,
    interfaces: Vec<Interface>,
    hostdevs: Vec<HostDevice>,
}

macro_rules! feature_property {
    ($name:ident, $feature:literal, $field:ident) => {
        pub const $name: XmlProperty<Self, bool> =
            XmlProperty::bound($feature, concat!("/domain/features/", $feature), |d: &Self| {
                d.$field
            })
            .with_setter(|d, value| {
                d.$field = value;
                Ok(())
            })
            .flag();
    };
}

impl Domain {
    /// Hypervisor driver, e.g. `kvm` or `qemu`.
    pub const DOMAIN_TYPE: XmlProperty<Self, String> =
        XmlProperty::bound("type", "/domain/@type", |d: &Self| d.domain_type.clone())
            .with_setter(|d, value| {
                d.domain_type = value;
                Ok(())
            });
    pub const NAME: XmlProperty<Self, String> =
        XmlProperty::bound("name", "/domain/name", |d: &Self| d.name.clone()).with_setter(
            |d, value| {
                check_name("name", &value)?;
                d.name = value;
                Ok(())
            },
        );
    pub const UUID: XmlProperty<Self, Option<String>> =
        XmlProperty::bound("uuid", "/domain/uuid", |d: &Self| d.uuid.clone()).with_setter(
            |d, value| {
                if let Some(uuid) = &value {
                    validate_uuid(uuid)?;
                }
                d.uuid = value;
                Ok(())
            },
        );
    pub const DESCRIPTION: XmlProperty<Self, Option<String>> =
        XmlProperty::bound("description", "/domain/description", |d: &Self| {
            d.description.clone()
        })
        .with_setter(|d, value| {
            d.description = value;
            Ok(())
        });
    /// Maximum memory in MiB; the document stores KiB.
    pub const MEMORY: XmlProperty<Self, u64> =
        XmlProperty::bound("memory", "/domain/memory", |d: &Self| d.memory)
            .with_setter(|d, value| {
                mib_to_kib(value)?;
                d.memory = value;
                Ok(())
            })
            .with_get_converter(|raw| parse_int::<u64>(raw).map(|kib| kib / 1024))
            .with_set_converter(|mib| {
                mib.checked_mul(1024)
                    .filter(|kib| *kib > 0)
                    .map(|kib| kib.to_string())
            });
    pub const VCPUS: XmlProperty<Self, u32> =
        XmlProperty::bound("vcpus", "/domain/vcpu", |d: &Self| d.vcpus).with_setter(
            |d, value| {
                if value == 0 {
                    return Err(ConfigError::invalid("a domain needs at least one vcpu"));
                }
                d.vcpus = value;
                Ok(())
            },
        );
    pub const OS_TYPE: XmlProperty<Self, String> =
        XmlProperty::bound("os_type", "/domain/os/type", |d: &Self| d.os_type.clone())
            .with_setter(|d, value| {
                d.os_type = value;
                Ok(())
            });
    pub const EMULATOR: XmlProperty<Self, Option<String>> =
        XmlProperty::bound("emulator", "/domain/devices/emulator", |d: &Self| {
            d.emulator.clone()
        })
        .with_setter(|d, value| {
            d.emulator = value;
            Ok(())
        });

    feature_property!(ACPI, "acpi", acpi);
    feature_property!(APIC, "apic", apic);
    feature_property!(PAE, "pae", pae);

    pub fn new(conn: Option<Rc<dyn Connection>>) -> Self {
        Self {
            base: XmlBase::new(conn),
            domain_type: "kvm".to_string(),
            name: String::new(),
            uuid: None,
            description: None,
            memory: 0,
            vcpus: 1,
            os_type: "hvm".to_string(),
            emulator: None,
            acpi: false,
            apic: false,
            pae: false,
            interfaces: Vec::new(),
            hostdevs: Vec::new(),
        }
    }

    pub fn parse(xml: &str, conn: Option<Rc<dyn Connection>>) -> Result<Self, ConfigError> {
        let base = XmlBase::parse(xml, conn)?;
        if base.root_name() != Some("domain") {
            return Err(ConfigError::invalid("expected a <domain> document"));
        }
        let mut domain = Self::new(None);
        domain.base = base;
        Ok(domain)
    }

    pub fn name(&self) -> Result<String, ConfigError> {
        Self::NAME.get(self)
    }

    pub fn set_name(&mut self, value: &str) -> Result<(), ConfigError> {
        Self::NAME.set(self, value.to_string())
    }

    pub fn uuid(&self) -> Result<Option<String>, ConfigError> {
        Self::UUID.get(self)
    }

    pub fn set_uuid(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        Self::UUID.set(self, value.map(str::to_string))
    }

    pub fn description(&self) -> Result<Option<String>, ConfigError> {
        Self::DESCRIPTION.get(self)
    }

    pub fn set_description(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        Self::DESCRIPTION.set(self, value.map(str::to_string))
    }

    pub fn memory(&self) -> Result<u64, ConfigError> {
        Self::MEMORY.get(self)
    }

    pub fn set_memory(&mut self, mib: u64) -> Result<(), ConfigError> {
        Self::MEMORY.set(self, mib)
    }

    pub fn vcpus(&self) -> Result<u32, ConfigError> {
        Self::VCPUS.get(self)
    }

    pub fn set_vcpus(&mut self, value: u32) -> Result<(), ConfigError> {
        Self::VCPUS.set(self, value)
    }

    pub fn os_type(&self) -> Result<String, ConfigError> {
        Self::OS_TYPE.get(self)
    }

    pub fn emulator(&self) -> Result<Option<String>, ConfigError> {
        Self::EMULATOR.get(self)
    }

    pub fn set_emulator(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        Self::EMULATOR.set(self, value.map(str::to_string))
    }

    pub fn acpi(&self) -> Result<bool, ConfigError> {
        Self::ACPI.get(self)
    }

    pub fn set_acpi(&mut self, value: bool) -> Result<(), ConfigError> {
        Self::ACPI.set(self, value)
    }

    pub fn apic(&self) -> Result<bool, ConfigError> {
        Self::APIC.get(self)
    }

    pub fn set_apic(&mut self, value: bool) -> Result<(), ConfigError> {
        Self::APIC.set(self, value)
    }

    pub fn pae(&self) -> Result<bool, ConfigError> {
        Self::PAE.get(self)
    }

    pub fn set_pae(&mut self, value: bool) -> Result<(), ConfigError> {
        Self::PAE.set(self, value)
    }

    pub fn add_interface(&mut self, iface: Interface) {
        self.interfaces.push(iface);
    }

    pub fn add_hostdev(&mut self, dev: HostDevice) {
        self.hostdevs.push(dev);
    }

    /// Emulator the connection advertises for this domain's OS type on the
    /// host architecture, provided the guest runs under the domain type.
    pub fn default_emulator(&self) -> Result<Option<String>, ConfigError> {
        let os_type = self.os_type()?;
        let domain_type = Self::DOMAIN_TYPE.get(self)?;
        let Some(caps) = self.base.capabilities()? else {
            return Ok(None);
        };
        if !caps.supports_domain_type(&os_type, &domain_type) {
            debug!(%os_type, %domain_type, "domain type not offered by host");
            return Ok(None);
        }
        let Some(arch) = caps.host.arch.as_deref() else {
            return Ok(None);
        };
        let emulator = caps
            .guest(&os_type, arch)
            .filter(|guest| guest.domain_types.iter().any(|t| *t == domain_type))
            .and_then(|guest| guest.emulator.clone());
        debug!(%os_type, arch, emulator = ?emulator, "default emulator lookup");
        Ok(emulator)
    }
}

impl XmlBuilder for Domain {
    fn base(&self) -> &XmlBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut XmlBase {
        &mut self.base
    }

    fn build_xml(&self) -> Result<String, ConfigError> {
        check_name("name", &self.name)?;
        if self.memory == 0 {
            return Err(ConfigError::invalid("domain memory must be set"));
        }

        let mut xml = format!("<domain type='{}'>\n", escape(&self.domain_type));
        xml.push_str(&format!("  <name>{}</name>\n", escape(&self.name)));
        if let Some(uuid) = &self.uuid {
            xml.push_str(&format!("  <uuid>{}</uuid>\n", escape(uuid)));
        }
        if let Some(description) = &self.description {
            xml.push_str(&format!(
                "  <description>{}</description>\n",
                escape(description)
            ));
        }
        let kib = mib_to_kib(self.memory)?;
        xml.push_str(&format!("  <memory>{kib}</memory>\n"));
        xml.push_str(&format!("  <currentMemory>{kib}</currentMemory>\n"));
        xml.push_str(&format!("  <vcpu>{}</vcpu>\n", self.vcpus));
        xml.push_str(&format!(
            "  <os>\n    <type>{}</type>\n  </os>\n",
            escape(&self.os_type)
        ));

        let features: Vec<&str> = [("acpi", self.acpi), ("apic", self.apic), ("pae", self.pae)]
            .into_iter()
            .filter_map(|(name, on)| on.then_some(name))
            .collect();
        if !features.is_empty() {
            xml.push_str("  <features>\n");
            for feature in features {
                xml.push_str(&format!("    <{feature}/>\n"));
            }
            xml.push_str("  </features>\n");
        }

        xml.push_str("  <devices>\n");
        if let Some(emulator) = &self.emulator {
            xml.push_str(&format!("    <emulator>{}</emulator>\n", escape(emulator)));
        }
        for iface in &self.interfaces {
            xml.push_str(&indent(&iface.get_xml_config()?, 4));
        }
        for dev in &self.hostdevs {
            xml.push_str(&indent(&dev.get_xml_config()?, 4));
        }
        xml.push_str("  </devices>\n</domain>\n");
        Ok(xml)
    }
}

fn mib_to_kib(mib: u64) -> Result<u64, ConfigError> {
    mib.checked_mul(1024)
        .ok_or_else(|| ConfigError::invalid(format!("memory size {mib} MiB is too large")))
}

/// Canonical `8-4-4-4-12` hex UUID.
pub fn validate_uuid(uuid: &str) -> Result<(), ConfigError> {
    let groups: Vec<&str> = uuid.split('-').collect();
    let valid = groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(group, len)| group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit()));
    if !valid {
        return Err(ConfigError::invalid(format!("invalid UUID '{uuid}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use virt_conn::MemoryConnection;

    const DEMO: &str = "<domain type=\"kvm\">\n  <name>demo</name>\n  <memory unit=\"KiB\">524288</memory>\n  <vcpu>2</vcpu>\n  <features>\n    <acpi/>\n  </features>\n  <devices>\n    <disk type=\"file\" device=\"disk\">\n      <source file=\"/var/lib/images/demo.qcow2\"/>\n    </disk>\n  </devices>\n</domain>\n";

    const CAPS: &str = "<capabilities><host><cpu><arch>x86_64</arch></cpu></host><guest><os_type>hvm</os_type><arch name='x86_64'><emulator>/usr/bin/qemu-system-x86_64</emulator><domain type='kvm'/></arch></guest></capabilities>";

    #[test]
    fn unmodified_document_round_trips() {
        let domain = Domain::parse(DEMO, None).unwrap();
        assert_eq!(domain.get_xml_config().unwrap(), DEMO);
    }

    #[test]
    fn parsed_fields() {
        let domain = Domain::parse(DEMO, None).unwrap();
        assert_eq!(domain.name().unwrap(), "demo");
        assert_eq!(domain.memory().unwrap(), 512);
        assert_eq!(domain.vcpus().unwrap(), 2);
        assert!(domain.acpi().unwrap());
        assert!(!domain.pae().unwrap());
        assert_eq!(domain.uuid().unwrap(), None);
        // Absent in the document, so the in-memory default shows through.
        assert_eq!(domain.os_type().unwrap(), "hvm");
    }

    #[test]
    fn edits_keep_unknown_markup() {
        let mut domain = Domain::parse(DEMO, None).unwrap();
        domain.set_memory(1024).unwrap();
        domain.set_apic(true).unwrap();
        domain.set_acpi(false).unwrap();
        domain
            .set_emulator(Some("/usr/bin/qemu-system-x86_64"))
            .unwrap();
        assert_eq!(domain.memory().unwrap(), 1024);
        assert!(!domain.acpi().unwrap());
        assert!(domain.apic().unwrap());

        let xml = domain.get_xml_config().unwrap();
        assert!(xml.contains("<memory unit=\"KiB\">1048576</memory>"));
        assert!(xml.contains("<features>\n    <apic/>\n  </features>"));
        assert!(!xml.contains("<acpi/>"));
        assert!(xml.contains("<emulator>/usr/bin/qemu-system-x86_64</emulator>"));
        assert!(xml.contains("<source file=\"/var/lib/images/demo.qcow2\"/>"));
    }

    #[test]
    fn clearing_removes_empty_ancestors() {
        let mut domain = Domain::parse(DEMO, None).unwrap();
        domain.set_acpi(false).unwrap();
        let xml = domain.get_xml_config().unwrap();
        assert!(!xml.contains("features"));
        assert!(xml.contains("  <vcpu>2</vcpu>\n  <devices>"));
    }

    #[test]
    fn scratch_build() {
        let mut domain = Domain::new(None);
        domain.set_name("web01").unwrap();
        domain.set_memory(2048).unwrap();
        domain.set_vcpus(4).unwrap();
        domain.set_pae(true).unwrap();
        domain
            .set_uuid(Some("4dea22b3-1d52-d8f3-2516-782e98ab3fa0"))
            .unwrap();
        let mut iface = Interface::new(None);
        iface.set_source(Some("default")).unwrap();
        domain.add_interface(iface);

        assert_eq!(domain.memory().unwrap(), 2048);
        assert!(domain.pae().unwrap());
        assert!(!domain.acpi().unwrap());

        let xml = domain.get_xml_config().unwrap();
        assert_eq!(
            xml,
            "<domain type='kvm'>\n  <name>web01</name>\n  <uuid>4dea22b3-1d52-d8f3-2516-782e98ab3fa0</uuid>\n  <memory>2097152</memory>\n  <currentMemory>2097152</currentMemory>\n  <vcpu>4</vcpu>\n  <os>\n    <type>hvm</type>\n  </os>\n  <features>\n    <pae/>\n  </features>\n  <devices>\n    <interface type='network'>\n      <source network='default'/>\n    </interface>\n  </devices>\n</domain>\n"
        );

        // The rendered document parses back to the same values.
        let parsed = Domain::parse(&xml, None).unwrap();
        assert_eq!(parsed.name().unwrap(), "web01");
        assert_eq!(parsed.memory().unwrap(), 2048);
        assert_eq!(parsed.vcpus().unwrap(), 4);
        assert!(parsed.pae().unwrap());
    }

    #[test]
    fn validation_errors() {
        let mut domain = Domain::new(None);
        assert!(matches!(
            domain.set_name("bad name"),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(domain.set_uuid(Some("not-a-uuid")).is_err());
        assert!(domain.set_vcpus(0).is_err());
        assert!(domain.build_xml().is_err());
        assert!(Domain::parse("<network/>", None).is_err());

        let domain = Domain::parse("<domain><memory>lots</memory></domain>", None).unwrap();
        assert!(matches!(domain.memory(), Err(ConfigError::InvalidNumber(_))));
    }

    #[test]
    fn materializes_missing_nodes() {
        let mut domain = Domain::parse("<domain>\n  <name>x</name>\n</domain>", None).unwrap();
        domain.set_description(Some("test & dev")).unwrap();
        domain.set_acpi(true).unwrap();
        assert_eq!(domain.description().unwrap().as_deref(), Some("test & dev"));
        assert_eq!(
            domain.get_xml_config().unwrap(),
            "<domain>\n  <features><acpi/>\n</features>\n  <description>test &amp; dev</description>\n  <name>x</name>\n</domain>\n"
        );
    }

    #[test]
    fn default_emulator_from_capabilities() {
        let conn = Rc::new(MemoryConnection::new("qemu:///system").with_capabilities(CAPS));
        let domain = Domain::new(Some(conn.clone()));
        assert_eq!(
            domain.default_emulator().unwrap().as_deref(),
            Some("/usr/bin/qemu-system-x86_64")
        );
        domain.default_emulator().unwrap();
        assert_eq!(conn.call_count("capabilities_xml"), 1);

        assert_eq!(Domain::new(None).default_emulator().unwrap(), None);
    }

    #[test]
    fn default_emulator_honours_domain_type() {
        let conn = Rc::new(MemoryConnection::new("qemu:///system").with_capabilities(CAPS));
        let mut domain = Domain::new(Some(conn));
        Domain::DOMAIN_TYPE.set(&mut domain, "xen".into()).unwrap();
        assert_eq!(domain.default_emulator().unwrap(), None);
    }

    #[test]
    fn oversized_memory_is_rejected() {
        let mut domain = Domain::new(None);
        domain.set_name("big").unwrap();
        let err = domain.set_memory(u64::MAX / 512).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
        assert_eq!(domain.memory().unwrap(), 0);

        let mut parsed = Domain::parse(DEMO, None).unwrap();
        assert!(parsed.set_memory(u64::MAX).is_err());
        assert_eq!(parsed.memory().unwrap(), 512);

        domain.set_memory(u64::MAX / 1024).unwrap();
        assert!(domain.build_xml().is_ok());
    }
}
