//! Stage trait definition
//!
//! Every step of the mastering chain implements `MasteringStage`. A stage
//! borrows its input and returns a new buffer of the same length and rate,
//! so the chain can fall back to the input when a soft stage fails.

use crate::engine::AudioBuffer;
use crate::error::{Result, StageId};

/// What the chain does when a stage returns an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log and continue with the stage's input unchanged
    Soft,
    /// Abort the run and surface the error to the caller
    Hard,
}

/// One step of the mastering chain
pub trait MasteringStage: Send + Sync {
    /// Identifier used in logs, reports and errors
    fn id(&self) -> StageId;

    /// Failure handling for this stage
    fn policy(&self) -> FailurePolicy;

    /// Process `input`, producing a buffer of identical length and rate
    fn process(&self, input: &AudioBuffer) -> Result<AudioBuffer>;

    /// Human-readable name
    fn display_name(&self) -> &'static str;
}
