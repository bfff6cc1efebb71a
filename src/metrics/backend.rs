//! Metrics backends

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::info;

/// Identity of a metric: its name plus the pipeline it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricKey {
    pub name: String,
    pub pipeline: String,
}

impl MetricKey {
    pub fn new(name: impl Into<String>, pipeline: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pipeline: pipeline.into(),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{pipeline=\"{}\"}}", self.name, self.pipeline)
    }
}

/// Accumulated timer observations
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerStats {
    pub count: u64,
    pub total: Duration,
    pub max: Duration,
}

impl TimerStats {
    fn record(&mut self, duration: Duration) {
        self.count = self.count.saturating_add(1);
        self.total = self.total.saturating_add(duration);
        if duration > self.max {
            self.max = duration;
        }
    }

    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total.as_nanos() / u128::from(self.count);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Trait for metrics backends
///
/// Backends are shared process-wide and must tolerate concurrent use from
/// arbitrary threads.
pub trait MetricsBackend: Send + Sync {
    /// Backend name, for logging
    fn name(&self) -> &str;

    fn increment_counter(&self, key: &MetricKey, amount: f64);

    fn counter_value(&self, key: &MetricKey) -> f64;

    fn set_gauge(&self, key: &MetricKey, value: f64);

    fn gauge_value(&self, key: &MetricKey) -> Option<f64>;

    fn record_timer(&self, key: &MetricKey, duration: Duration);

    fn timer_stats(&self, key: &MetricKey) -> TimerStats;

    /// Point-in-time copy of every metric
    fn snapshot(&self) -> MetricsSnapshot;
}

/// In-memory backend, the default when no other backend is configured
#[derive(Default)]
pub struct InMemoryMetrics {
    counters: RwLock<HashMap<MetricKey, f64>>,
    gauges: RwLock<HashMap<MetricKey, f64>>,
    timers: RwLock<HashMap<MetricKey, TimerStats>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

// A panic while holding one of these locks leaves plain numbers behind, so a
// poisoned lock is still safe to use.
macro_rules! read_lock {
    ($lock:expr) => {
        $lock.read().unwrap_or_else(|e| e.into_inner())
    };
}

macro_rules! write_lock {
    ($lock:expr) => {
        $lock.write().unwrap_or_else(|e| e.into_inner())
    };
}

impl MetricsBackend for InMemoryMetrics {
    fn name(&self) -> &str {
        "memory"
    }

    fn increment_counter(&self, key: &MetricKey, amount: f64) {
        *write_lock!(self.counters).entry(key.clone()).or_insert(0.0) += amount;
    }

    fn counter_value(&self, key: &MetricKey) -> f64 {
        read_lock!(self.counters).get(key).copied().unwrap_or(0.0)
    }

    fn set_gauge(&self, key: &MetricKey, value: f64) {
        write_lock!(self.gauges).insert(key.clone(), value);
    }

    fn gauge_value(&self, key: &MetricKey) -> Option<f64> {
        read_lock!(self.gauges).get(key).copied()
    }

    fn record_timer(&self, key: &MetricKey, duration: Duration) {
        write_lock!(self.timers).entry(key.clone()).or_default().record(duration);
    }

    fn timer_stats(&self, key: &MetricKey) -> TimerStats {
        read_lock!(self.timers).get(key).copied().unwrap_or_default()
    }

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: read_lock!(self.counters).iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            gauges: read_lock!(self.gauges).iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            timers: read_lock!(self.timers).iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }
}

/// Backend that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    fn name(&self) -> &str {
        "noop"
    }

    fn increment_counter(&self, _key: &MetricKey, _amount: f64) {}

    fn counter_value(&self, _key: &MetricKey) -> f64 {
        0.0
    }

    fn set_gauge(&self, _key: &MetricKey, _value: f64) {}

    fn gauge_value(&self, _key: &MetricKey) -> Option<f64> {
        None
    }

    fn record_timer(&self, _key: &MetricKey, _duration: Duration) {}

    fn timer_stats(&self, _key: &MetricKey) -> TimerStats {
        TimerStats::default()
    }

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::default()
    }
}

/// Backend kinds selectable from the engine configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsBackendKind {
    #[default]
    Memory,
    Noop,
}

impl MetricsBackendKind {
    pub fn create(self) -> Arc<dyn MetricsBackend> {
        match self {
            MetricsBackendKind::Memory => Arc::new(InMemoryMetrics::new()),
            MetricsBackendKind::Noop => Arc::new(NoopMetrics),
        }
    }
}

/// Pick the backend to use from the ones available at startup
///
/// The first candidate wins; with no candidates an in-memory backend is used.
pub fn select_backend(candidates: Vec<Arc<dyn MetricsBackend>>) -> Arc<dyn MetricsBackend> {
    if candidates.len() > 1 {
        info!(
            "Found {} metrics backends, using the first one ({})",
            candidates.len(),
            candidates[0].name()
        );
    }
    candidates
        .into_iter()
        .next()
        .unwrap_or_else(|| Arc::new(InMemoryMetrics::new()))
}

/// Copy of all metric values, keyed by `MetricKey` display form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, f64>,
    pub gauges: BTreeMap<String, f64>,
    pub timers: BTreeMap<String, TimerStats>,
}

impl MetricsSnapshot {
    /// Plain-text rendering, one metric per line
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.counters {
            out.push_str(&format!("counter {} {}\n", key, value));
        }
        for (key, value) in &self.gauges {
            out.push_str(&format!("gauge {} {}\n", key, value));
        }
        for (key, stats) in &self.timers {
            out.push_str(&format!(
                "timer {} count={} total_ms={:.3} max_ms={:.3}\n",
                key,
                stats.count,
                stats.total.as_secs_f64() * 1000.0,
                stats.max.as_secs_f64() * 1000.0
            ));
        }
        out
    }
}
