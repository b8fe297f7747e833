use crate::error::{CliError, Result};
use anyhow::Context;
use edmd::core::io::document::SimulationDocument;
use edmd::core::io::traits::ConfigFile;
use std::path::Path;
use tracing::info;

pub fn write_document(document: &SimulationDocument, path: &Path) -> Result<()> {
    document.write_to_path(path)?;
    info!(path = %path.display(), particles = document.particles.len(), "Configuration written.");
    Ok(())
}

/// Writes the collected plugin results as a TOML table.
pub fn write_output_data(output: &toml::Table, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(output)
        .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to serialise output data: {e}")))?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output data to '{}'", path.display()))?;
    info!(path = %path.display(), "Output data written.");
    Ok(())
}
