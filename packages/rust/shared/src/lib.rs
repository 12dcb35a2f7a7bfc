//! Shared types, error model, and configuration for Blockwise.
//!
//! This crate is the foundation depended on by all other Blockwise crates.
//! It provides:
//! - [`BlockwiseError`] — the unified error type
//! - The document model ([`Document`], [`Page`], [`Block`], [`BlockKind`])
//! - Configuration ([`AppConfig`], [`SummaryConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BridgeConfig, SummaryConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, validate_api_key,
};
pub use error::{BlockwiseError, Result};
pub use types::{Block, BlockContent, BlockId, BlockKind, BlockMetadata, Document, Page};
