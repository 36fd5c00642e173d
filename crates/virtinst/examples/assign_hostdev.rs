use std::error::Error;
use std::rc::Rc;

use virtinst::nodedev::{self, CAPABILITY_TYPE_PCI, CAPABILITY_TYPE_USBDEV};
use virtinst::{hostdev_for_name, Connection, Domain, Interface, MemoryConnection, XmlBuilder};

type Result<T> = std::result::Result<T, Box<dyn Error>>;

const CAPS: &str = r#"
    <capabilities>
      <host><cpu><arch>x86_64</arch></cpu></host>
      <guest>
        <os_type>hvm</os_type>
        <arch name='x86_64'>
          <emulator>/usr/bin/qemu-system-x86_64</emulator>
          <domain type='kvm'/>
        </arch>
      </guest>
    </capabilities>
"#;

const NIC: &str = r#"
    <device>
      <name>pci_0000_02_00_0</name>
      <parent>pci_0000_00_1c_0</parent>
      <capability type='pci'>
        <domain>0</domain>
        <bus>2</bus>
        <slot>0</slot>
        <function>0</function>
        <product id='0x1533'>I210 Gigabit Network Connection</product>
        <vendor id='0x8086'>Intel Corporation</vendor>
      </capability>
    </device>
"#;

const TOKEN: &str = r#"
    <device>
      <name>usb_3_1</name>
      <parent>usb_usb3</parent>
      <capability type='usb_device'>
        <bus>3</bus>
        <device>1</device>
        <product id='0x0407'>Yubikey 4/5 OTP+U2F+CCID</product>
        <vendor id='0x1050'>Yubico.com</vendor>
      </capability>
    </device>
"#;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let conn = Rc::new(
        MemoryConnection::new("qemu:///system")
            .with_capabilities(CAPS)
            .with_device("pci_0000_02_00_0", CAPABILITY_TYPE_PCI, NIC)
            .with_device("usb_3_1", CAPABILITY_TYPE_USBDEV, TOKEN),
    );

    println!("-- host devices --");
    for dev in nodedev::list_node_devices(conn.as_ref(), None)? {
        println!("{:<20} {}", dev.device_type, dev.pretty_name());
    }
    println!(
        "detach capable: {}",
        nodedev::is_pci_detach_capable(conn.as_ref())?
    );

    let shared: Rc<dyn Connection> = conn.clone();
    let mut domain = Domain::new(Some(shared.clone()));
    domain.set_name("router")?;
    domain.set_memory(2048)?;
    domain.set_vcpus(2)?;
    domain.set_acpi(true)?;
    domain.set_apic(true)?;
    let emulator = domain.default_emulator()?;
    domain.set_emulator(emulator.as_deref())?;

    let mut uplink = Interface::new(Some(shared.clone()));
    uplink.set_net_type("bridge")?;
    uplink.set_source(Some("br0"))?;
    uplink.set_model(Some("virtio"))?;
    domain.add_interface(uplink);

    domain.add_hostdev(hostdev_for_name(shared.clone(), "pci_0000_02_00_0")?);
    domain.add_hostdev(hostdev_for_name(shared, "usb_3_1")?);

    println!("-- domain xml --");
    print!("{}", domain.get_xml_config()?);
    Ok(())
}
