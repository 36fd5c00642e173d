use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use virtinst::nodedev;

use crate::common;

pub fn run(file: &Path, json: bool) -> Result<()> {
    let xml = common::read_xml(file)?;
    let device = nodedev::parse(&xml).with_context(|| format!("parse {}", file.display()))?;
    info!(device_type = %device.device_type, "parsed node device");

    if json {
        return common::print_json(&device);
    }
    println!("{:<12} {}", "Name", device.name.as_deref().unwrap_or("-"));
    println!("{:<12} {}", "Parent", device.parent.as_deref().unwrap_or("-"));
    println!("{:<12} {}", "Capability", device.device_type);
    println!("{:<12} {}", "Label", device.pretty_name());
    Ok(())
}
