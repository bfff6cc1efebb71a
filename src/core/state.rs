//! Execution state models

use crate::data::Data;
use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Lifecycle of a built executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorState {
    /// Built and idle
    Ready,
    /// At least one `exec` call in progress
    Running,
    /// Runners released; `exec` fails
    Closed,
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorState::Ready => write!(f, "ready"),
            ExecutorState::Running => write!(f, "running"),
            ExecutorState::Closed => write!(f, "closed"),
        }
    }
}

/// Thread-safe tracking of `ExecutorState`
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    closed: AtomicBool,
    in_flight: AtomicUsize,
}

impl Lifecycle {
    pub(crate) fn state(&self) -> ExecutorState {
        if self.closed.load(Ordering::Acquire) {
            ExecutorState::Closed
        } else if self.in_flight.load(Ordering::Acquire) > 0 {
            ExecutorState::Running
        } else {
            ExecutorState::Ready
        }
    }

    /// Register an `exec` call; the returned guard ends it
    pub(crate) fn begin(&self) -> PipelineResult<RunGuard<'_>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PipelineError::ExecutorClosed);
        }
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        Ok(RunGuard { lifecycle: self })
    }

    /// Mark closed; returns false if it already was
    pub(crate) fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

pub(crate) struct RunGuard<'a> {
    lifecycle: &'a Lifecycle,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.lifecycle.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Per-node state during one graph execution
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeState {
    Pending,
    Produced(Data),
    /// A switch that picked `branch`
    Switched { branch: usize, data: Data },
    Skipped,
}

impl NodeState {
    /// The Data this node passes on, if it produced any
    ///
    /// A switch passes nothing on by itself; only its selected
    /// `switch_output` node does.
    pub(crate) fn data(&self) -> Option<&Data> {
        match self {
            NodeState::Produced(data) => Some(data),
            NodeState::Pending | NodeState::Switched { .. } | NodeState::Skipped => None,
        }
    }

    pub(crate) fn into_data(self) -> Option<Data> {
        match self {
            NodeState::Produced(data) => Some(data),
            NodeState::Pending | NodeState::Switched { .. } | NodeState::Skipped => None,
        }
    }
}
