use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::common;

pub fn run(file: &Path, path: &str, value: &str, in_place: bool) -> Result<()> {
    let xml = common::read_xml(file)?;
    let edited =
        virtinst::set_path(&xml, path, value).with_context(|| format!("set {path}"))?;
    debug!(%path, %value, "set path");
    common::emit_xml(file, &edited, in_place)
}
