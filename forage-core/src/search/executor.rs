//! Environment executor seam

use async_trait::async_trait;

use crate::error::ExecutionError;
use crate::trace::Rollout;
use crate::types::ProgramId;

/// Runs program sequences against a live environment
///
/// The returned rollout must repeat `programs` exactly and carry a finite
/// value; the controller treats anything else as an [`ExecutionError`].
/// This is the only call in a search iteration expected to block.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, programs: &[ProgramId]) -> Result<Rollout, ExecutionError>;
}
