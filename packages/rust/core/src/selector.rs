//! Block selection and prompt construction.
//!
//! Walks a document in traversal order and emits one [`GenerationRequest`]
//! per block that is of an eligible kind, not excluded upstream, and has
//! non-empty context. Blocks that fail any of these checks are skipped
//! silently: exclusion is not an error and touches no counter.

use tracing::{debug, trace};

use blockwise_shared::{Block, Document, SummaryConfig};

use crate::prompt::render_summary_prompt;
use crate::schema::{GenerationRequest, ResponseSchema};

/// Prefix marking context that came from an image description.
pub const IMAGE_DESCRIPTION_PREFIX: &str = "Image description: ";

/// Build summary requests for every eligible block of `document`.
pub fn build_requests(document: &Document, config: &SummaryConfig) -> Vec<GenerationRequest> {
    let schema = ResponseSchema::summary();
    let mut requests = Vec::new();

    for (id, page_id, block) in document.blocks() {
        if !config.is_eligible(block.kind) {
            continue;
        }
        if block.is_excluded() {
            trace!(block = %id, kind = %block.kind, "skipping excluded block");
            continue;
        }

        let Some(context) = derive_context(block, config) else {
            trace!(block = %id, kind = %block.kind, "skipping block with empty context");
            continue;
        };

        requests.push(GenerationRequest {
            block: id,
            page_id,
            prompt: render_summary_prompt(&context),
            schema,
        });
    }

    debug!(
        blocks = document.block_count(),
        requests = requests.len(),
        "built summary requests"
    );
    requests
}

/// Bounded textual context for one block, or `None` when there is nothing to summarize.
///
/// Short or empty text falls back to the image description when the block
/// has one. The character cap is applied last.
pub fn derive_context(block: &Block, config: &SummaryConfig) -> Option<String> {
    let text = block.raw_text().trim();

    let context = match block.description() {
        Some(description)
            if text.is_empty() || text.chars().count() < config.min_context_chars =>
        {
            format!("{IMAGE_DESCRIPTION_PREFIX}{description}")
        }
        _ => text.to_string(),
    };

    if context.is_empty() {
        return None;
    }

    Some(truncate_chars(context, config.max_context_chars))
}

/// Keep at most `max_chars` characters, cutting on a char boundary.
fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((byte_idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_idx);
    }
    text
}
