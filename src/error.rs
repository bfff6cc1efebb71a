//! Pipeline error types

use crate::data::DataError;
use thiserror::Error;

/// Broad classification of a `PipelineError`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid topology or unresolvable step; raised at build time
    Configuration,
    /// Runtime type/shape mismatch; aborts the current execution only
    Validation,
    /// A step's own logic failed
    Execution,
    /// Profiler or metrics I/O
    Resource,
}

/// Errors that can occur while building or executing a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cycle detected in pipeline graph involving nodes: {}", .nodes.join(", "))]
    Cycle { nodes: Vec<String> },

    #[error("Node '{node}' references non-existent node '{reference}'")]
    DanglingReference { node: String, reference: String },

    #[error("No registered runner factory can run step type '{step_type}'")]
    UnsupportedStep { step_type: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Output node '{output}' was skipped; no output produced")]
    NoOutputProduced { output: String },

    #[error("Step '{step}' failed: {message}")]
    Execution { step: String, message: String },

    #[error("Pipeline executor is closed")]
    ExecutorClosed,

    #[error("Resource error: {0}")]
    Resource(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Configuration(_)
            | PipelineError::Cycle { .. }
            | PipelineError::DanglingReference { .. }
            | PipelineError::UnsupportedStep { .. } => ErrorKind::Configuration,
            PipelineError::Validation(_)
            | PipelineError::Data(_)
            | PipelineError::NoOutputProduced { .. } => ErrorKind::Validation,
            PipelineError::Execution { .. } | PipelineError::ExecutorClosed => ErrorKind::Execution,
            PipelineError::Resource(_) => ErrorKind::Resource,
        }
    }

    /// Convenience constructor for step failures
    pub fn execution(step: impl Into<String>, message: impl std::fmt::Display) -> Self {
        PipelineError::Execution {
            step: step.into(),
            message: message.to_string(),
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
