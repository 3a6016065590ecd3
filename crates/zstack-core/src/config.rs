use serde::{Deserialize, Serialize};

use crate::artifacts::{ArtifactOptions, RepairParams};
use crate::error::{FusionError, Result};
use crate::grid::ConsistencyLevel;
use crate::levels::LevelPolicyConfig;
use crate::merge::FusionStrategy;

/// Everything needed to run one fusion job, loadable from TOML.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    #[serde(default)]
    pub consistency: ConsistencyLevel,
    #[serde(default)]
    pub strategy: FusionStrategy,
    #[serde(default)]
    pub levels: LevelPolicyConfig,
    /// Run artifact detection after fusion.
    pub artifacts: Option<ArtifactOptions>,
    /// Repair detected artifacts (requires `artifacts`).
    pub repair: Option<RepairParams>,
}

impl FusionConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| FusionError::InvalidParameter(format!("invalid fusion config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| FusionError::InvalidParameter(format!("cannot serialize config: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        if let FusionStrategy::WeightedBlend(params) = &self.strategy {
            params.validate()?;
        }
        if let Some(options) = &self.artifacts {
            options.validate()?;
        }
        if self.repair.is_some() && self.artifacts.is_none() {
            return Err(FusionError::InvalidParameter(
                "repair needs artifact detection to be configured".into(),
            ));
        }
        Ok(())
    }
}
