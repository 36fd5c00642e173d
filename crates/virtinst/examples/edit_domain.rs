use std::env;
use std::error::Error;
use std::fs;

use virtinst::{Domain, XmlBuilder};

type Result<T> = std::result::Result<T, Box<dyn Error>>;

const SAMPLE: &str = r#"<domain type="kvm">
  <name>fedora</name>
  <uuid>c7a5fdbd-cdaf-9455-926a-d65c16db1809</uuid>
  <memory unit="KiB">2097152</memory>
  <vcpu placement="static">2</vcpu>
  <os>
    <type arch="x86_64" machine="pc-q35-8.1">hvm</type>
    <boot dev="hd"/>
  </os>
  <features>
    <acpi/>
    <apic/>
  </features>
  <devices>
    <emulator>/usr/bin/qemu-system-x86_64</emulator>
    <disk type="file" device="disk">
      <driver name="qemu" type="qcow2"/>
      <source file="/var/lib/libvirt/images/fedora.qcow2"/>
      <target dev="vda" bus="virtio"/>
    </disk>
  </devices>
</domain>
"#;

fn main() -> Result<()> {
    let xml = match env::args().nth(1) {
        Some(path) => fs::read_to_string(path)?,
        None => SAMPLE.to_string(),
    };

    let mut domain = Domain::parse(&xml, None)?;
    println!(
        "name={} memory={}MiB vcpus={} acpi={} pae={}",
        domain.name()?,
        domain.memory()?,
        domain.vcpus()?,
        domain.acpi()?,
        domain.pae()?
    );

    domain.set_memory(domain.memory()? * 2)?;
    domain.set_vcpus(4)?;
    domain.set_apic(false)?;
    domain.set_description(Some("resized by edit_domain"))?;

    print!("{}", domain.get_xml_config()?);
    Ok(())
}
