//! Metrics facade handed to running steps
//!
//! Steps never reach a backend directly: they get a `PipelineMetrics` from
//! their `StepContext`, which tags every metric with the pipeline id.

pub mod backend;

pub use backend::{
    select_backend, InMemoryMetrics, MetricKey, MetricsBackend, MetricsBackendKind, MetricsSnapshot,
    NoopMetrics, TimerStats,
};

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-pipeline view over a metrics backend
#[derive(Clone)]
pub struct PipelineMetrics {
    pipeline_id: String,
    backend: Arc<dyn MetricsBackend>,
}

impl std::fmt::Debug for PipelineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineMetrics")
            .field("pipeline_id", &self.pipeline_id)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl PipelineMetrics {
    pub fn new(pipeline_id: impl Into<String>, backend: Arc<dyn MetricsBackend>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            backend,
        }
    }

    /// A facade that records nothing
    pub fn disabled(pipeline_id: impl Into<String>) -> Self {
        Self::new(pipeline_id, Arc::new(NoopMetrics))
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    fn key(&self, name: &str) -> MetricKey {
        MetricKey::new(name, self.pipeline_id.clone())
    }

    pub fn counter(&self, name: &str) -> Counter {
        Counter {
            key: self.key(name),
            backend: self.backend.clone(),
        }
    }

    /// A gauge, set to `value`
    pub fn gauge(&self, name: &str, value: f64) -> Gauge {
        let gauge = Gauge {
            key: self.key(name),
            backend: self.backend.clone(),
        };
        gauge.set(value);
        gauge
    }

    pub fn timer(&self, name: &str) -> Timer {
        Timer {
            key: self.key(name),
            backend: self.backend.clone(),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.backend.snapshot()
    }
}

/// Monotonic counter
#[derive(Clone)]
pub struct Counter {
    key: MetricKey,
    backend: Arc<dyn MetricsBackend>,
}

impl Counter {
    pub fn increment(&self) {
        self.increment_by(1.0);
    }

    pub fn increment_by(&self, amount: f64) {
        self.backend.increment_counter(&self.key, amount);
    }

    pub fn count(&self) -> f64 {
        self.backend.counter_value(&self.key)
    }
}

/// Last-value gauge
#[derive(Clone)]
pub struct Gauge {
    key: MetricKey,
    backend: Arc<dyn MetricsBackend>,
}

impl Gauge {
    pub fn set(&self, value: f64) {
        self.backend.set_gauge(&self.key, value);
    }

    pub fn value(&self) -> f64 {
        self.backend.gauge_value(&self.key).unwrap_or(f64::NAN)
    }
}

/// Duration recorder
#[derive(Clone)]
pub struct Timer {
    key: MetricKey,
    backend: Arc<dyn MetricsBackend>,
}

impl Timer {
    pub fn record(&self, duration: Duration) {
        self.backend.record_timer(&self.key, duration);
    }

    /// Start measuring; finish with `TimerSample::stop`
    pub fn start(&self) -> TimerSample {
        TimerSample {
            started: Instant::now(),
        }
    }

    /// Run `f` and record how long it took
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let sample = self.start();
        let out = f();
        sample.stop(self);
        out
    }

    pub fn stats(&self) -> TimerStats {
        self.backend.timer_stats(&self.key)
    }
}

/// An in-flight timer measurement
#[derive(Debug, Clone, Copy)]
pub struct TimerSample {
    started: Instant,
}

impl TimerSample {
    /// Record the elapsed time on `timer` and return it
    pub fn stop(self, timer: &Timer) -> Duration {
        let elapsed = self.started.elapsed();
        timer.record(elapsed);
        elapsed
    }
}
