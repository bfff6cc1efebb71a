//! Test utility functions for serving-pipeline

#![allow(dead_code)]

use serving_pipeline::core::{StepContext, StepRunner, StepRunnerFactory};
use serving_pipeline::steps::FnStepFactory;
use serving_pipeline::{Data, PipelineContext, PipelineError, PipelineResult, StepConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared counters for `CountStepFactory`
#[derive(Debug, Default)]
pub struct CountStats {
    pub created: AtomicUsize,
    pub executed: AtomicUsize,
    pub closed: AtomicUsize,
}

impl CountStats {
    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

/// `count` step: adds 1 to the INT64 `count` field (0 when missing) and
/// records every create/exec/close in `CountStats`
pub struct CountStepFactory {
    pub stats: Arc<CountStats>,
}

struct CountStepRunner {
    config: StepConfig,
    stats: Arc<CountStats>,
}

impl StepRunnerFactory for CountStepFactory {
    fn step_type(&self) -> &str {
        "count"
    }

    fn create(&self, config: &StepConfig) -> PipelineResult<Box<dyn StepRunner>> {
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountStepRunner {
            config: config.clone(),
            stats: self.stats.clone(),
        }))
    }
}

impl StepRunner for CountStepRunner {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    fn exec(&self, ctx: &StepContext, input: &Data) -> PipelineResult<Data> {
        self.stats.executed.fetch_add(1, Ordering::SeqCst);
        ctx.metrics().counter("count.calls").increment();

        let count = if input.has("count") { input.get_i64("count")? } else { 0 };
        let mut out = input.clone();
        out.remove("count");
        out.put("count", count + 1)?;
        Ok(out)
    }

    fn close(&mut self) -> PipelineResult<()> {
        let closed = self.stats.closed.fetch_add(1, Ordering::SeqCst);
        if self.config.param::<bool>("fail_close")?.unwrap_or(false) {
            return Err(PipelineError::Resource(format!("close #{} failed", closed + 1)));
        }
        Ok(())
    }
}

/// Context with the built-ins, `count`, `tag` and `fail` steps
///
/// - `tag`: sets the boolean field named by its `tag` param
/// - `fail`: always fails with an execution error
pub fn test_context(stats: Arc<CountStats>) -> PipelineContext {
    test_context_builder(stats).build()
}

pub fn test_context_builder(stats: Arc<CountStats>) -> serving_pipeline::core::PipelineContextBuilder {
    PipelineContext::builder()
        .register(CountStepFactory { stats })
        .register(FnStepFactory::new("tag", |config, _, input: &Data| {
            let tag: String = config
                .param("tag")?
                .ok_or_else(|| PipelineError::Configuration("tag step needs a 'tag'".to_string()))?;
            let mut out = input.clone();
            out.put(tag, true)?;
            Ok(out)
        }))
        .register(FnStepFactory::new("fail", |config, _, _input: &Data| {
            Err(PipelineError::execution(&config.step_type, "boom"))
        }))
}

pub fn count_step() -> StepConfig {
    StepConfig::new("count")
}

pub fn tag_step(tag: &str) -> StepConfig {
    StepConfig::new("tag").with("tag", tag)
}
