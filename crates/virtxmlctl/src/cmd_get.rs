use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::common;

#[derive(Serialize)]
struct PathValue<'a> {
    path: &'a str,
    value: Option<String>,
}

pub fn run(file: &Path, path: &str, json: bool) -> Result<()> {
    let xml = common::read_xml(file)?;
    let value = virtinst::get_path(&xml, path).with_context(|| format!("evaluate {path}"))?;

    if json {
        return common::print_json(&PathValue { path, value });
    }
    match value {
        Some(value) => println!("{value}"),
        None => println!("(not set)"),
    }
    Ok(())
}
