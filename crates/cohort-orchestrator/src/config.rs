use std::path::Path;

use cohort_transform::TransformationConfig;
use cohort_validation::ValidationConfig;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Which snapshot the distribution stage stages for a participant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionSource {
    /// The transformed outbound snapshot.
    #[default]
    Outbound,
    /// The snapshot as loaded, before transformation.
    Inbound,
}

/// Pipeline configuration, loadable from TOML.
///
/// ```toml
/// max_concurrent_records = 16
/// stage_distribution_from = "outbound"
///
/// [validation]
/// postcode_max_len = 8
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on records validated or transformed at once.
    pub max_concurrent_records: usize,
    pub stage_distribution_from: DistributionSource,
    /// Copied onto every exception the pipeline raises.
    pub cohort_name: Option<String>,
    pub screening_name: Option<String>,
    pub validation: ValidationConfig,
    pub transformation: TransformationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_records: 32,
            stage_distribution_from: DistributionSource::Outbound,
            cohort_name: None,
            screening_name: None,
            validation: ValidationConfig::default(),
            transformation: TransformationConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> PipelineResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn check(&self) -> PipelineResult<()> {
        if self.max_concurrent_records == 0 {
            return Err(PipelineError::Config(
                "max_concurrent_records must be at least 1".into(),
            ));
        }
        if self.validation.postcode_min_len > self.validation.postcode_max_len {
            return Err(PipelineError::Config(
                "postcode_min_len exceeds postcode_max_len".into(),
            ));
        }
        self.transformation.check()?;
        Ok(())
    }
}
