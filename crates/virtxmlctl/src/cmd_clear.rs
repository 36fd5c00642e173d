use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::common;

pub fn run(file: &Path, path: &str, in_place: bool) -> Result<()> {
    let xml = common::read_xml(file)?;
    let edited = virtinst::clear_path(&xml, path).with_context(|| format!("clear {path}"))?;
    debug!(%path, "cleared path");
    common::emit_xml(file, &edited, in_place)
}
