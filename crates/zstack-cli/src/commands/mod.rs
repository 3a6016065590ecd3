pub mod config;
pub mod synth;

use std::path::Path;

use anyhow::{Context, Result};
use zstack_core::config::FusionConfig;

/// Load and validate a fusion config, or fall back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<FusionConfig> {
    let Some(path) = path else {
        return Ok(FusionConfig::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    FusionConfig::from_toml_str(&contents)
        .with_context(|| format!("Invalid fusion config {}", path.display()))
}
