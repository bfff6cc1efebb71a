//! Sequence executor

use super::{close_runner, ExecMetrics, ExecutorState};
use crate::core::context::{PipelineContext, StepContext};
use crate::core::pipeline::SequencePipeline;
use crate::core::runner::StepRunner;
use crate::core::state::Lifecycle;
use crate::data::Data;
use crate::error::PipelineResult;
use tracing::{debug, info};

/// Runs steps in order, feeding each output into the next step
pub struct SequenceExecutor {
    pipeline_id: String,
    steps: Vec<(String, Box<dyn StepRunner>)>,
    ctx: StepContext,
    metrics: ExecMetrics,
    lifecycle: Lifecycle,
}

impl SequenceExecutor {
    /// Create a runner for every step
    ///
    /// If any step cannot be created, the runners created so far are closed
    /// and the error is returned.
    pub fn new(pipeline: &SequencePipeline, ctx: &PipelineContext) -> PipelineResult<Self> {
        let pipeline_id = pipeline.id().to_string();
        let mut steps: Vec<(String, Box<dyn StepRunner>)> = Vec::with_capacity(pipeline.steps().len());

        for (index, config) in pipeline.steps().iter().enumerate() {
            let label = format!("{}:{}", index, config.step_type);
            match ctx.registry().create_runner(config) {
                Ok(runner) => steps.push((label, runner)),
                Err(e) => {
                    for (label, runner) in steps.iter_mut() {
                        close_runner(&pipeline_id, label, runner.as_mut());
                    }
                    return Err(e);
                }
            }
        }

        info!("Built sequence pipeline {} with {} steps", pipeline_id, steps.len());
        let step_ctx = ctx.step_context(&pipeline_id);
        Ok(Self {
            metrics: ExecMetrics::new(&step_ctx),
            ctx: step_ctx,
            pipeline_id,
            steps,
            lifecycle: Lifecycle::default(),
        })
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    pub fn state(&self) -> ExecutorState {
        self.lifecycle.state()
    }

    /// Run every step in order; the first failure aborts the run
    pub fn exec(&self, input: &Data) -> PipelineResult<Data> {
        let _running = self.lifecycle.begin()?;
        self.metrics.observe(|| {
            let mut current: Option<Data> = None;
            for (label, runner) in &self.steps {
                let step_input = current.as_ref().unwrap_or(input);
                debug!("Pipeline {}: running step {}", self.pipeline_id, label);
                let output = self.ctx.profile(label, || runner.exec(&self.ctx, step_input))?;
                current = Some(output);
            }
            Ok(current.unwrap_or_else(|| input.clone()))
        })
    }

    /// Close every runner exactly once
    ///
    /// A runner that fails to close is logged and the remaining runners are
    /// still closed.
    pub fn close(&mut self) {
        if !self.lifecycle.close() {
            return;
        }
        let failed = self
            .steps
            .iter_mut()
            .map(|(label, runner)| close_runner(&self.pipeline_id, label, runner.as_mut()))
            .filter(|ok| !ok)
            .count();
        debug!(
            "Closed sequence pipeline {} ({} close failures)",
            self.pipeline_id, failed
        );
    }
}

impl Drop for SequenceExecutor {
    fn drop(&mut self) {
        self.close();
    }
}
