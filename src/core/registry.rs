//! Step registry: maps step type discriminators to runner factories

use crate::core::runner::StepRunner;
use crate::core::step::StepConfig;
use crate::error::{PipelineError, PipelineResult};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Creates runners for one kind of step
pub trait StepRunnerFactory: Send + Sync {
    /// Discriminator this factory is registered under
    fn step_type(&self) -> &str;

    /// Whether this factory can run `config`
    fn can_run(&self, config: &StepConfig) -> bool {
        config.step_type == self.step_type()
    }

    fn create(&self, config: &StepConfig) -> PipelineResult<Box<dyn StepRunner>>;
}

/// Registration table of runner factories
///
/// Nothing is discovered implicitly: a factory is only used once it has
/// been registered.
#[derive(Clone, Default)]
pub struct StepRegistry {
    factories: IndexMap<String, Arc<dyn StepRunnerFactory>>,
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("step_types", &self.step_types())
            .finish()
    }
}

impl StepRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in steps
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::steps::register_builtins(&mut registry);
        registry
    }

    /// Register a factory under its step type
    ///
    /// Registering a type again replaces the previous factory, which is
    /// returned.
    pub fn register(
        &mut self,
        factory: impl StepRunnerFactory + 'static,
    ) -> Option<Arc<dyn StepRunnerFactory>> {
        self.register_arc(Arc::new(factory))
    }

    pub fn register_arc(
        &mut self,
        factory: Arc<dyn StepRunnerFactory>,
    ) -> Option<Arc<dyn StepRunnerFactory>> {
        let step_type = factory.step_type().to_string();
        let replaced = self.factories.insert(step_type.clone(), factory);
        if replaced.is_some() {
            info!("Replacing runner factory for step type '{}'", step_type);
        } else {
            debug!("Registered runner factory for step type '{}'", step_type);
        }
        replaced
    }

    /// Find the factory for `config`
    ///
    /// Factories are asked in registration order and the first one that can
    /// run the config wins.
    pub fn resolve(&self, config: &StepConfig) -> PipelineResult<Arc<dyn StepRunnerFactory>> {
        self.factories
            .values()
            .find(|factory| factory.can_run(config))
            .cloned()
            .ok_or_else(|| PipelineError::UnsupportedStep {
                step_type: config.step_type.clone(),
            })
    }

    /// Resolve `config` and create its runner
    pub fn create_runner(&self, config: &StepConfig) -> PipelineResult<Box<dyn StepRunner>> {
        self.resolve(config)?.create(config)
    }

    pub fn contains(&self, step_type: &str) -> bool {
        self.factories.contains_key(step_type)
    }

    /// Registered step types, in registration order
    pub fn step_types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}
