//! Request/response contracts between the selector, the backend, and the applier.

use serde::Serialize;

use blockwise_shared::BlockId;

/// Raw backend output. Untrusted until it passes [`crate::applier::validate_response`].
pub type GenerationResponse = serde_json::Map<String, serde_json::Value>;

/// Response field holding the model's rationale. Requested, never stored.
pub const ANALYSIS_FIELD: &str = "analysis";

/// Response field holding the deliverable summary.
pub const SUMMARY_FIELD: &str = "summary";

// ---------------------------------------------------------------------------
// ResponseSchema
// ---------------------------------------------------------------------------

/// A structured-output contract: an object of required string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResponseSchema {
    /// Schema title, forwarded to backends that name their schemas.
    pub name: &'static str,
    /// Required string fields, in the order the model should produce them.
    pub fields: &'static [&'static str],
}

impl ResponseSchema {
    /// `{analysis: string, summary: string}`.
    pub const fn summary() -> Self {
        Self {
            name: "SummarySchema",
            fields: &[ANALYSIS_FIELD, SUMMARY_FIELD],
        }
    }

    /// Render as a JSON Schema object.
    pub fn to_json_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|field| {
                (
                    (*field).to_string(),
                    serde_json::json!({ "title": title_case(field), "type": "string" }),
                )
            })
            .collect();

        serde_json::json!({
            "title": self.name,
            "type": "object",
            "properties": properties,
            "required": self.fields,
        })
    }
}

fn title_case(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// GenerationRequest
// ---------------------------------------------------------------------------

/// One block's prompt, ready for dispatch. Carries no image payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    /// The block this request summarizes.
    pub block: BlockId,
    /// Page number of the source block.
    pub page_id: u32,
    /// Fully rendered prompt text.
    pub prompt: String,
    /// Expected response shape.
    pub schema: ResponseSchema,
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// Why a response was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The backend produced nothing (failure, timeout, per-request error).
    Absent,
    /// The response has no `summary` field.
    MissingSummary,
    /// `summary` is present but not a string.
    SummaryNotText,
    /// Trimmed summary is shorter than the configured minimum.
    TooShort { chars: usize },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => write!(f, "no response"),
            Self::MissingSummary => write!(f, "response has no summary field"),
            Self::SummaryNotText => write!(f, "summary field is not text"),
            Self::TooShort { chars } => write!(f, "summary too short ({chars} chars)"),
        }
    }
}

/// Outcome of validating one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted { summary: String },
    Rejected { reason: RejectReason },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}
