//! End-to-end summary run: select → generate → apply.
//!
//! Requests are dispatched one at a time in document order. Every request
//! ends in exactly one applied outcome: a response that never arrives
//! within the deadline is applied as absent and error-counted, and the
//! backend is recovered before the next request starts. A dead backend ends
//! the run.

use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};

use blockwise_shared::{Document, Result, SummaryConfig};

use crate::applier::apply_response;
use crate::backend::GenerationBackend;
use crate::selector::build_requests;

/// Outcome counts for one run over a document.
#[derive(Debug, Clone, Default)]
pub struct SummaryReport {
    /// Blocks in the document, selected or not.
    pub blocks_total: usize,
    /// Requests emitted by the selector.
    pub requests: usize,
    /// Responses accepted and written as summaries.
    pub accepted: usize,
    /// Responses rejected, absent, or timed out.
    pub rejected: usize,
    /// Wall time of the run.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for summary runs.
pub trait SummaryProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Task-level progress within the current phase.
    fn task_progress(&self, current: usize, total: usize, detail: &str);
}

/// No-op summary progress.
pub struct SilentSummaryProgress;

impl SummaryProgress for SilentSummaryProgress {
    fn phase(&self, _name: &str) {}
    fn task_progress(&self, _current: usize, _total: usize, _detail: &str) {}
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Summarize every eligible block of `document` through `backend`.
///
/// Per-request backend failures and timeouts are recorded on the affected
/// block and the run continues. Invalid config and fatal backend errors
/// (see [`blockwise_shared::BlockwiseError::is_fatal`]) return `Err`; blocks
/// not yet reached are left untouched.
#[instrument(skip_all, fields(blocks = document.block_count()))]
pub async fn run_summaries<B: GenerationBackend>(
    document: &mut Document,
    config: &SummaryConfig,
    backend: &mut B,
    request_timeout: Duration,
    progress: &dyn SummaryProgress,
) -> Result<SummaryReport> {
    config.validate()?;
    let start = Instant::now();

    progress.phase("Selecting blocks");
    let requests = build_requests(document, config);

    let mut report = SummaryReport {
        blocks_total: document.block_count(),
        requests: requests.len(),
        ..Default::default()
    };

    progress.phase("Summarizing blocks");
    for (idx, request) in requests.iter().enumerate() {
        progress.task_progress(idx + 1, requests.len(), &format!("block {}", request.block));

        let outcome =
            tokio::time::timeout(request_timeout, backend.generate(&request.prompt, &request.schema))
                .await;

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_fatal() => {
                error!(
                    block = %request.block,
                    error = %e,
                    completed = idx,
                    remaining = requests.len() - idx,
                    "backend unusable, aborting run"
                );
                return Err(e);
            }
            Ok(Err(e)) => {
                warn!(block = %request.block, error = %e, "generation failed");
                None
            }
            Err(_) => {
                warn!(
                    block = %request.block,
                    timeout_secs = request_timeout.as_secs_f64(),
                    "generation timed out"
                );
                // Outside the deadline so the next request gets its full budget.
                backend.recover().await?;
                None
            }
        };

        if apply_response(document, request, response.as_ref(), config).is_accepted() {
            report.accepted += 1;
        } else {
            report.rejected += 1;
        }
    }

    report.elapsed = start.elapsed();
    info!(
        requests = report.requests,
        accepted = report.accepted,
        rejected = report.rejected,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "summary run complete"
    );

    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
