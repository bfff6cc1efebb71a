//! Core domain models for pipelines
//!
//! This module defines step configs, the step registry, the pipeline
//! documents and the contexts used to build and run them.

pub mod config;
pub mod context;
pub mod graph;
pub mod pipeline;
pub mod registry;
pub mod runner;
pub mod state;
pub mod step;
pub mod switch;
mod topology;

pub use config::{EngineConfig, MetricsConfig};
pub use context::{PipelineContext, PipelineContextBuilder, StepContext};
pub use graph::{switch_output_name, GraphBuilder, GraphPipeline, GraphStep};
pub use pipeline::{Pipeline, SequenceBuilder, SequencePipeline};
pub use registry::{StepRegistry, StepRunnerFactory};
pub use runner::StepRunner;
pub use state::ExecutorState;
pub use step::StepConfig;
pub use switch::{IntFieldSwitch, StringFieldSwitch, SwitchFn, SwitchFnConfig};
