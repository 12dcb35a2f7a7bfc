//! Block summarization core for Blockwise.
//!
//! The selector turns a [`blockwise_shared::Document`] into generation
//! requests, the applier validates responses and writes them back. The
//! pipeline module drives both against a [`backend::GenerationBackend`],
//! of which [`bridge::BridgeBackend`] is the subprocess implementation.

pub mod applier;
pub mod backend;
pub mod bridge;
pub mod pipeline;
pub mod prompt;
pub mod schema;
pub mod selector;

pub use applier::{apply_response, apply_to_block, validate_response};
pub use backend::GenerationBackend;
pub use schema::{GenerationRequest, GenerationResponse, RejectReason, ResponseSchema, Verdict};
pub use selector::{build_requests, derive_context};
