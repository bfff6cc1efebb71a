//! Engine configuration from YAML or JSON

use crate::error::{PipelineError, PipelineResult};
use crate::metrics::MetricsBackendKind;
use crate::profiler::ProfilerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Profiling is off unless this section is present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiler: Option<ProfilerConfig>,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metrics settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub backend: MetricsBackendKind,
}

impl EngineConfig {
    /// Load from a file; `.json` files are read as JSON, anything else as YAML
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    pub fn from_yaml(yaml: &str) -> PipelineResult<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)
            .map_err(|e| PipelineError::Configuration(format!("invalid engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> PipelineResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| PipelineError::Configuration(format!("invalid engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if let Some(profiler) = &self.profiler {
            if profiler.output_file.as_os_str().is_empty() {
                return Err(PipelineError::Configuration(
                    "profiler output_file must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
