//! Response validation and write-back.
//!
//! A response either sets the block's summary or bumps its error counter.
//! Nothing else on the block is touched, and no response is fatal.

use tracing::{debug, warn};

use blockwise_shared::{Block, Document, SummaryConfig};

use crate::schema::{GenerationRequest, GenerationResponse, RejectReason, SUMMARY_FIELD, Verdict};

/// Validate an untrusted response into a [`Verdict`].
pub fn validate_response(
    response: Option<&GenerationResponse>,
    min_summary_chars: usize,
) -> Verdict {
    let Some(response) = response else {
        return Verdict::Rejected {
            reason: RejectReason::Absent,
        };
    };

    let summary = match response.get(SUMMARY_FIELD) {
        None => {
            return Verdict::Rejected {
                reason: RejectReason::MissingSummary,
            };
        }
        Some(serde_json::Value::String(s)) => s.trim(),
        Some(_) => {
            return Verdict::Rejected {
                reason: RejectReason::SummaryNotText,
            };
        }
    };

    let chars = summary.chars().count();
    if chars < min_summary_chars {
        return Verdict::Rejected {
            reason: RejectReason::TooShort { chars },
        };
    }

    Verdict::Accepted {
        summary: summary.to_string(),
    }
}

/// Validate `response` and commit the outcome onto `block`.
pub fn apply_to_block(
    block: &mut Block,
    response: Option<&GenerationResponse>,
    config: &SummaryConfig,
) -> Verdict {
    let verdict = validate_response(response, config.min_summary_chars);
    match &verdict {
        Verdict::Accepted { summary } => block.summary = Some(summary.clone()),
        Verdict::Rejected { .. } => block.record_error(),
    }
    verdict
}

/// Apply the response for `request` to the block it targets.
///
/// A request whose block no longer exists mutates nothing and is reported
/// as [`RejectReason::Absent`].
pub fn apply_response(
    document: &mut Document,
    request: &GenerationRequest,
    response: Option<&GenerationResponse>,
    config: &SummaryConfig,
) -> Verdict {
    let Some(block) = document.block_mut(request.block) else {
        warn!(block = %request.block, "response targets a block that does not exist");
        return Verdict::Rejected {
            reason: RejectReason::Absent,
        };
    };

    let verdict = apply_to_block(block, response, config);
    match &verdict {
        Verdict::Accepted { summary } => {
            debug!(block = %request.block, chars = summary.chars().count(), "summary accepted");
        }
        Verdict::Rejected { reason } => {
            warn!(
                block = %request.block,
                page = request.page_id,
                %reason,
                errors = block.metadata.llm_error_count,
                "summary rejected"
            );
        }
    }
    verdict
}
