//! Step configuration model

use crate::error::{PipelineError, PipelineResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Immutable description of one pipeline stage
///
/// The `@type` discriminator selects the runner factory through the
/// registry; every other field is type-specific and kept verbatim so each
/// factory can parse it into its own typed config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    /// Step type discriminator
    #[serde(rename = "@type")]
    pub step_type: String,

    /// Type-specific fields
    #[serde(flatten)]
    params: Map<String, JsonValue>,
}

impl StepConfig {
    /// Create a config with no fields
    pub fn new(step_type: impl Into<String>) -> Self {
        Self {
            step_type: step_type.into(),
            params: Map::new(),
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        // Serializing plain values into a JSON tree cannot fail for the types
        // used in configs; anything unrepresentable is stored as null.
        let value = serde_json::to_value(value).unwrap_or(JsonValue::Null);
        self.params.insert(key.into(), value);
        self
    }

    pub fn params(&self) -> &Map<String, JsonValue> {
        &self.params
    }

    pub fn has_param(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Read a single field
    pub fn param<T: DeserializeOwned>(&self, key: &str) -> PipelineResult<Option<T>> {
        match self.params.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                PipelineError::Configuration(format!(
                    "step '{}' field '{}' is invalid: {}",
                    self.step_type, key, e
                ))
            }),
        }
    }

    /// Parse every field into a typed config struct
    pub fn parse<T: DeserializeOwned>(&self) -> PipelineResult<T> {
        serde_json::from_value(JsonValue::Object(self.params.clone())).map_err(|e| {
            PipelineError::Configuration(format!("invalid '{}' step config: {}", self.step_type, e))
        })
    }
}
