//! Built-in steps

pub mod function;
pub mod logging;
pub mod set;

pub use function::FnStepFactory;
pub use logging::LoggingStepFactory;
pub use set::SetStepFactory;

use crate::core::registry::StepRegistry;

/// Register every built-in step type on `registry`
pub fn register_builtins(registry: &mut StepRegistry) {
    registry.register(LoggingStepFactory);
    registry.register(SetStepFactory);
}
