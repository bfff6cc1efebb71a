//! `logging` step: logs the data passing through it

use crate::core::context::StepContext;
use crate::core::registry::StepRunnerFactory;
use crate::core::runner::StepRunner;
use crate::core::step::StepConfig;
use crate::data::{Data, Value};
use crate::error::{PipelineError, PipelineResult};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogContent {
    #[default]
    Keys,
    KeysAndValues,
}

#[derive(Debug, Deserialize)]
struct LoggingConfig {
    #[serde(default)]
    level: LogLevel,
    #[serde(default)]
    log: LogContent,
    /// Only keys matching this pattern are logged
    #[serde(default)]
    key_filter_regex: Option<String>,
}

pub struct LoggingStepFactory;

impl StepRunnerFactory for LoggingStepFactory {
    fn step_type(&self) -> &str {
        "logging"
    }

    fn create(&self, config: &StepConfig) -> PipelineResult<Box<dyn StepRunner>> {
        let parsed: LoggingConfig = config.parse()?;
        let key_filter = parsed
            .key_filter_regex
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| PipelineError::Configuration(format!("invalid key_filter_regex: {}", e)))?;
        Ok(Box::new(LoggingStepRunner {
            config: config.clone(),
            level: parsed.level,
            content: parsed.log,
            key_filter,
        }))
    }
}

struct LoggingStepRunner {
    config: StepConfig,
    level: LogLevel,
    content: LogContent,
    key_filter: Option<Regex>,
}

impl LoggingStepRunner {
    fn render(&self, data: &Data) -> String {
        data.iter()
            .filter(|(key, _)| self.key_filter.as_ref().map_or(true, |re| re.is_match(key)))
            .map(|(key, value)| match self.content {
                LogContent::Keys => format!("{} ({})", key, value.value_type()),
                LogContent::KeysAndValues => format!("{} = {}", key, render_value(value)),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        Value::Int64(i) => i.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Bytes(b) => format!("<{} bytes>", b.len()),
        Value::NDArray(a) => format!("<{} ndarray {:?}>", a.element_type(), a.shape()),
        Value::Image(i) => format!("<image {}x{}>", i.width, i.height),
        Value::Point(p) => format!("({}, {})", p.x, p.y),
        Value::BoundingBox(b) => format!("[{}, {}, {}, {}]", b.x1, b.y1, b.x2, b.y2),
        Value::List(l) => format!("<list of {} x{}>", l.element_type(), l.len()),
        Value::Data(d) => format!("<data with {} keys>", d.len()),
    }
}

impl StepRunner for LoggingStepRunner {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    fn exec(&self, _ctx: &StepContext, input: &Data) -> PipelineResult<Data> {
        let line = self.render(input);
        match self.level {
            LogLevel::Trace => trace!("Data: {}", line),
            LogLevel::Debug => debug!("Data: {}", line),
            LogLevel::Info => info!("Data: {}", line),
            LogLevel::Warn => warn!("Data: {}", line),
            LogLevel::Error => error!("Data: {}", line),
        }
        Ok(input.clone())
    }
}
