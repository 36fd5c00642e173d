use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use virtinst::Domain;

use crate::common;

#[derive(Serialize)]
struct DomainSummary {
    name: String,
    uuid: Option<String>,
    memory_mib: u64,
    vcpus: u32,
    os_type: String,
    emulator: Option<String>,
    features: Vec<&'static str>,
}

pub fn run(file: &Path, json: bool) -> Result<()> {
    let xml = common::read_xml(file)?;
    let domain = Domain::parse(&xml, None).with_context(|| format!("parse {}", file.display()))?;

    let mut features = Vec::new();
    for (name, on) in [
        ("acpi", domain.acpi()?),
        ("apic", domain.apic()?),
        ("pae", domain.pae()?),
    ] {
        if on {
            features.push(name);
        }
    }
    let summary = DomainSummary {
        name: domain.name()?,
        uuid: domain.uuid()?,
        memory_mib: domain.memory()?,
        vcpus: domain.vcpus()?,
        os_type: domain.os_type()?,
        emulator: domain.emulator()?,
        features,
    };

    if json {
        return common::print_json(&summary);
    }
    println!("{:<10} {}", "Name", summary.name);
    println!("{:<10} {}", "UUID", summary.uuid.as_deref().unwrap_or("-"));
    println!("{:<10} {} MiB", "Memory", summary.memory_mib);
    println!("{:<10} {}", "vCPUs", summary.vcpus);
    println!("{:<10} {}", "OS type", summary.os_type);
    println!("{:<10} {}", "Emulator", summary.emulator.as_deref().unwrap_or("-"));
    println!("{:<10} {}", "Features", summary.features.join(","));
    Ok(())
}
