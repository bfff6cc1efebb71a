//! serving-pipeline - execution core for inference-serving pipelines

pub mod cli;
pub mod core;
pub mod data;
pub mod error;
pub mod execution;
pub mod metrics;
pub mod profiler;
pub mod steps;

// Re-export commonly used types
pub use crate::core::{
    EngineConfig, GraphBuilder, GraphPipeline, GraphStep, Pipeline, PipelineContext, SequencePipeline,
    StepConfig, StepContext, StepRegistry, StepRunner, StepRunnerFactory, SwitchFn, SwitchFnConfig,
};
pub use data::{Data, DataError, List, MergeMode, Value, ValueType};
pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use execution::{ExecutorState, PipelineExecutor};
pub use metrics::PipelineMetrics;
pub use profiler::{Profiler, ProfilerConfig};
