//! Engine and step contexts
//!
//! `PipelineContext` owns the process-wide collaborators (step registry,
//! metrics backend, optional profiler) and is passed explicitly to pipeline
//! builders. Running steps see a narrower `StepContext`.

use crate::core::config::EngineConfig;
use crate::core::registry::{StepRegistry, StepRunnerFactory};
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::{select_backend, InMemoryMetrics, MetricsBackend, PipelineMetrics};
use crate::profiler::Profiler;
use std::sync::Arc;
use tracing::debug;

/// Shared engine state used to build executors
#[derive(Clone)]
pub struct PipelineContext {
    registry: Arc<StepRegistry>,
    metrics: Arc<dyn MetricsBackend>,
    profiler: Option<Arc<Profiler>>,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("registry", &self.registry)
            .field("metrics", &self.metrics.name())
            .field("profiler", &self.profiler)
            .finish()
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineContext {
    /// Built-in steps, in-memory metrics, no profiler
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> PipelineContextBuilder {
        PipelineContextBuilder::default()
    }

    /// Build a context from an engine configuration file's contents
    pub fn from_config(config: &EngineConfig) -> PipelineResult<Self> {
        let mut builder = Self::builder().metrics_backend(select_backend(vec![config
            .metrics
            .backend
            .create()]));
        if let Some(profiler_config) = &config.profiler {
            let profiler = Profiler::new(profiler_config).map_err(|e| {
                PipelineError::Resource(format!(
                    "cannot open trace file {}: {}",
                    profiler_config.output_file.display(),
                    e
                ))
            })?;
            builder = builder.profiler(Arc::new(profiler));
        }
        Ok(builder.build())
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn metrics_backend(&self) -> &Arc<dyn MetricsBackend> {
        &self.metrics
    }

    pub fn profiler(&self) -> Option<&Arc<Profiler>> {
        self.profiler.as_ref()
    }

    /// Context handed to the steps of pipeline `pipeline_id`
    pub fn step_context(&self, pipeline_id: &str) -> StepContext {
        StepContext {
            metrics: PipelineMetrics::new(pipeline_id, self.metrics.clone()),
            profiler: self.profiler.clone(),
        }
    }

    /// Flush and stop the profiler, if any
    pub fn shutdown(&self) {
        if let Some(profiler) = &self.profiler {
            profiler.shutdown();
        }
        debug!("Pipeline context shut down");
    }
}

/// Builder for `PipelineContext`
#[derive(Default)]
pub struct PipelineContextBuilder {
    registry: Option<StepRegistry>,
    extra: Vec<Arc<dyn StepRunnerFactory>>,
    metrics: Option<Arc<dyn MetricsBackend>>,
    profiler: Option<Arc<Profiler>>,
}

impl PipelineContextBuilder {
    /// Use `registry` instead of the built-in one
    pub fn registry(mut self, registry: StepRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register an additional factory on top of the registry
    pub fn register(mut self, factory: impl StepRunnerFactory + 'static) -> Self {
        self.extra.push(Arc::new(factory));
        self
    }

    pub fn metrics_backend(mut self, backend: Arc<dyn MetricsBackend>) -> Self {
        self.metrics = Some(backend);
        self
    }

    pub fn profiler(mut self, profiler: Arc<Profiler>) -> Self {
        self.profiler = Some(profiler);
        self
    }

    pub fn build(self) -> PipelineContext {
        let mut registry = self.registry.unwrap_or_else(StepRegistry::with_builtins);
        for factory in self.extra {
            registry.register_arc(factory);
        }
        PipelineContext {
            registry: Arc::new(registry),
            metrics: self
                .metrics
                .unwrap_or_else(|| Arc::new(InMemoryMetrics::new())),
            profiler: self.profiler,
        }
    }
}

/// What a running step can reach
#[derive(Debug, Clone)]
pub struct StepContext {
    metrics: PipelineMetrics,
    profiler: Option<Arc<Profiler>>,
}

impl StepContext {
    /// A context with metrics disabled and no profiler
    pub fn detached(pipeline_id: &str) -> Self {
        Self {
            metrics: PipelineMetrics::disabled(pipeline_id),
            profiler: None,
        }
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn profiler(&self) -> Option<&Profiler> {
        self.profiler.as_deref()
    }

    /// Wrap `f` in begin/end trace events when profiling is enabled
    pub fn profile<T>(&self, label: &str, f: impl FnOnce() -> T) -> T {
        match self.profiler() {
            Some(profiler) => {
                profiler.event_start(label);
                let out = f();
                profiler.event_end(label);
                out
            }
            None => f(),
        }
    }
}
