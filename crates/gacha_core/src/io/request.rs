use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};

use crate::request::SimulationRequest;

/// Load a simulation request JSON document from disk.
pub fn load_from_path(path: &Path) -> Result<SimulationRequest> {
    let file =
        File::open(path).with_context(|| format!("failed to open request file {:?}", path))?;
    from_reader(BufReader::new(file)).with_context(|| format!("in request file {:?}", path))
}

/// Deserialize a request document from an arbitrary reader.
pub fn from_reader<R: Read>(reader: R) -> Result<SimulationRequest> {
    serde_json::from_reader(reader).context("invalid request json")
}
