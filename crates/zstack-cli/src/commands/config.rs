use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use zstack_core::artifacts::{ArtifactOptions, RepairParams};
use zstack_core::config::FusionConfig;

use crate::summary::print_fusion_summary;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Validate an existing config file and print its summary
    #[arg(long, conflicts_with = "output")]
    pub check: Option<PathBuf>,
}

/// Print or save a full default FusionConfig as TOML, or check one.
pub fn run(args: &ConfigArgs) -> Result<()> {
    if let Some(ref path) = args.check {
        let config = super::load_config(Some(path))?;
        print_fusion_summary(&config);
        println!("  Config OK");
        return Ok(());
    }

    let config = FusionConfig {
        artifacts: Some(ArtifactOptions::default()),
        repair: Some(RepairParams::default()),
        ..Default::default()
    };
    let toml_str = config.to_toml_string()?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
