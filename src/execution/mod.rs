//! Pipeline executors
//!
//! Executors are synchronous: `exec` runs every step on the calling thread.
//! One executor may serve concurrent `exec` calls as long as its runners
//! allow it.

pub mod graph;
pub mod sequence;

pub use crate::core::state::ExecutorState;
pub use graph::GraphExecutor;
pub use sequence::SequenceExecutor;

use crate::core::context::StepContext;
use crate::core::runner::StepRunner;
use crate::data::Data;
use crate::error::PipelineResult;
use crate::metrics::{Counter, Timer};
use tracing::warn;

/// Executor of either pipeline shape
pub enum PipelineExecutor {
    Sequence(SequenceExecutor),
    Graph(GraphExecutor),
}

impl PipelineExecutor {
    /// Run the pipeline on `input`
    pub fn exec(&self, input: &Data) -> PipelineResult<Data> {
        match self {
            PipelineExecutor::Sequence(e) => e.exec(input),
            PipelineExecutor::Graph(e) => e.exec(input),
        }
    }

    /// Release every runner; later `exec` calls fail
    pub fn close(&mut self) {
        match self {
            PipelineExecutor::Sequence(e) => e.close(),
            PipelineExecutor::Graph(e) => e.close(),
        }
    }

    pub fn state(&self) -> ExecutorState {
        match self {
            PipelineExecutor::Sequence(e) => e.state(),
            PipelineExecutor::Graph(e) => e.state(),
        }
    }

    pub fn pipeline_id(&self) -> &str {
        match self {
            PipelineExecutor::Sequence(e) => e.pipeline_id(),
            PipelineExecutor::Graph(e) => e.pipeline_id(),
        }
    }
}

/// Pipeline-level metrics recorded around every `exec`
struct ExecMetrics {
    count: Counter,
    failures: Counter,
    time: Timer,
}

impl ExecMetrics {
    fn new(ctx: &StepContext) -> Self {
        let metrics = ctx.metrics();
        Self {
            count: metrics.counter("pipeline.exec.count"),
            failures: metrics.counter("pipeline.exec.failures"),
            time: metrics.timer("pipeline.exec.time"),
        }
    }

    fn observe(&self, f: impl FnOnce() -> PipelineResult<Data>) -> PipelineResult<Data> {
        self.count.increment();
        let result = self.time.time(f);
        if result.is_err() {
            self.failures.increment();
        }
        result
    }
}

/// Close one runner, logging failures; returns whether it closed cleanly
fn close_runner(pipeline_id: &str, label: &str, runner: &mut dyn StepRunner) -> bool {
    match runner.close() {
        Ok(()) => true,
        Err(e) => {
            warn!("Pipeline {}: failed to close step {}: {}", pipeline_id, label, e);
            false
        }
    }
}
