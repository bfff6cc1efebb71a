//! Step runner abstraction

use crate::core::context::StepContext;
use crate::core::step::StepConfig;
use crate::data::Data;
use crate::error::PipelineResult;

/// Executable instance of one step config
///
/// Runners are created once per built pipeline and shared by every `exec`
/// call, so `exec` takes `&self`. A runner that keeps mutable state must
/// synchronize it internally.
pub trait StepRunner: Send + Sync {
    /// The config this runner was created from
    fn config(&self) -> &StepConfig;

    /// Transform `input` into a new Data
    fn exec(&self, ctx: &StepContext, input: &Data) -> PipelineResult<Data>;

    /// Release runtime resources; called exactly once by the owning executor
    fn close(&mut self) -> PipelineResult<()> {
        Ok(())
    }
}
