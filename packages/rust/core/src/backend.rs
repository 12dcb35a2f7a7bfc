//! Generation backend seam.

use blockwise_shared::Result;

use crate::schema::{GenerationResponse, ResponseSchema};

/// A structured-output text generation service.
///
/// `Ok(None)` signals that the backend produced nothing for this prompt
/// (refusal, per-request failure); the block is error-counted. An `Err` for
/// which [`blockwise_shared::BlockwiseError::is_fatal`] is false is treated
/// the same way; a fatal one ends the run.
#[allow(async_fn_in_trait)]
pub trait GenerationBackend {
    async fn generate(
        &mut self,
        prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<Option<GenerationResponse>>;

    /// Bring the backend back to an idle state after a `generate` call was
    /// abandoned mid-flight (deadline hit). Runs outside any request deadline.
    async fn recover(&mut self) -> Result<()> {
        Ok(())
    }
}
