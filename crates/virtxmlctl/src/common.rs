use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

pub fn read_xml(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

/// Print `xml`, or write it back to `path` when editing in place.
pub fn emit_xml(path: &Path, xml: &str, in_place: bool) -> Result<()> {
    if in_place {
        fs::write(path, xml).with_context(|| format!("write {}", path.display()))?;
        info!(path = %path.display(), "updated document");
    } else {
        print!("{xml}");
    }
    Ok(())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialise JSON output")?;
    println!("{text}");
    Ok(())
}
