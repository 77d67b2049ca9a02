pub mod check;
pub mod config;
pub mod demo;

use std::path::Path;

use anyhow::{Context, Result};
use voltrace_core::ExtractionConfig;

/// Read an extraction config from a TOML file.
pub fn load_config(path: &Path) -> Result<ExtractionConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("Invalid extraction config {}", path.display()))
}
