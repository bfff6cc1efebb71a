//! Closure-backed steps

use crate::core::context::StepContext;
use crate::core::registry::StepRunnerFactory;
use crate::core::runner::StepRunner;
use crate::core::step::StepConfig;
use crate::data::Data;
use crate::error::PipelineResult;
use std::sync::Arc;

type StepFn = dyn Fn(&StepConfig, &StepContext, &Data) -> PipelineResult<Data> + Send + Sync;

/// Registers a plain Rust function as a step type
///
/// ```
/// use serving_pipeline::{Data, StepRegistry};
/// use serving_pipeline::steps::FnStepFactory;
///
/// let mut registry = StepRegistry::new();
/// registry.register(FnStepFactory::new("echo", |_, _, input: &Data| Ok(input.clone())));
/// assert!(registry.contains("echo"));
/// ```
#[derive(Clone)]
pub struct FnStepFactory {
    step_type: String,
    f: Arc<StepFn>,
}

impl FnStepFactory {
    pub fn new<F>(step_type: impl Into<String>, f: F) -> Self
    where
        F: Fn(&StepConfig, &StepContext, &Data) -> PipelineResult<Data> + Send + Sync + 'static,
    {
        Self {
            step_type: step_type.into(),
            f: Arc::new(f),
        }
    }
}

impl StepRunnerFactory for FnStepFactory {
    fn step_type(&self) -> &str {
        &self.step_type
    }

    fn create(&self, config: &StepConfig) -> PipelineResult<Box<dyn StepRunner>> {
        Ok(Box::new(FnStepRunner {
            config: config.clone(),
            f: self.f.clone(),
        }))
    }
}

struct FnStepRunner {
    config: StepConfig,
    f: Arc<StepFn>,
}

impl StepRunner for FnStepRunner {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    fn exec(&self, ctx: &StepContext, input: &Data) -> PipelineResult<Data> {
        (self.f)(&self.config, ctx, input)
    }
}
