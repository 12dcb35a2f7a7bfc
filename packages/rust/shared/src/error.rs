//! Error types for Blockwise.
//!
//! Library crates use [`BlockwiseError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Per-block generation failures are *not* errors: they are recorded on the
//! block's error counter. This type only covers failures of the surrounding
//! machinery (config, document loading, the generation transport).

use std::path::PathBuf;

/// Top-level error type for all Blockwise operations.
#[derive(Debug, thiserror::Error)]
pub enum BlockwiseError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Document JSON could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Generation failure scoped to one request (malformed bridge message).
    #[error("generation error: {0}")]
    Generation(String),

    /// The bridge is unusable (spawn failed, stdout closed, stdin write failed). No
    /// further request can succeed on this session.
    #[error("bridge transport error: {0}")]
    Transport(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (kind/content mismatch, bad limits, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BlockwiseError>;

impl BlockwiseError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a per-request generation error.
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Create a fatal bridge transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Whether this error ends the run instead of failing a single block.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Generation(_))
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
