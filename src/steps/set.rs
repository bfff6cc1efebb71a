//! `set` step: writes constant values into the data

use crate::core::context::StepContext;
use crate::core::registry::StepRunnerFactory;
use crate::core::runner::StepRunner;
use crate::core::step::StepConfig;
use crate::data::{Data, DataError, List, MergeMode, Value};
use crate::error::{PipelineError, PipelineResult};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as JsonValue;

#[derive(Debug, Deserialize)]
struct SetConfig {
    values: IndexMap<String, JsonValue>,
    /// Replace keys that already exist (their type must not change)
    #[serde(default = "default_overwrite")]
    overwrite: bool,
}

fn default_overwrite() -> bool {
    true
}

pub struct SetStepFactory;

impl StepRunnerFactory for SetStepFactory {
    fn step_type(&self) -> &str {
        "set"
    }

    fn create(&self, config: &StepConfig) -> PipelineResult<Box<dyn StepRunner>> {
        let parsed: SetConfig = config.parse()?;
        let mut values = Data::new();
        for (key, json) in &parsed.values {
            let value = from_json(json).map_err(|e| {
                PipelineError::Configuration(format!("set step value '{}': {}", key, e))
            })?;
            values.put(key.clone(), value)?;
        }
        Ok(Box::new(SetStepRunner {
            config: config.clone(),
            values,
            mode: if parsed.overwrite {
                MergeMode::Overwrite
            } else {
                MergeMode::KeepExisting
            },
        }))
    }
}

struct SetStepRunner {
    config: StepConfig,
    values: Data,
    mode: MergeMode,
}

impl StepRunner for SetStepRunner {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    fn exec(&self, _ctx: &StepContext, input: &Data) -> PipelineResult<Data> {
        let mut out = input.clone();
        out.merge(&self.values, self.mode)?;
        Ok(out)
    }
}

/// Plain JSON to a typed value: strings, integers, floats, booleans, arrays
/// of one type and nested objects
fn from_json(json: &JsonValue) -> Result<Value, DataError> {
    match json {
        JsonValue::String(s) => Ok(Value::String(s.clone())),
        JsonValue::Bool(b) => Ok(Value::Boolean(*b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int64(i)),
            None => n
                .as_f64()
                .map(Value::Double)
                .ok_or_else(|| DataError::InvalidValue(format!("unsupported number {}", n))),
        },
        JsonValue::Array(items) => {
            let items = items.iter().map(from_json).collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(List::infer(items)?))
        }
        JsonValue::Object(map) => {
            let mut nested = Data::new();
            for (key, value) in map {
                nested.put(key.clone(), from_json(value)?)?;
            }
            Ok(Value::Data(nested))
        }
        JsonValue::Null => Err(DataError::InvalidValue("null is not a value".to_string())),
    }
}
