//! Application configuration for Blockwise.
//!
//! User config lives at `~/.blockwise/blockwise.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BlockwiseError, Result};
use crate::types::BlockKind;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "blockwise.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".blockwise";

// ---------------------------------------------------------------------------
// Config structs (matching blockwise.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Block selection and response acceptance.
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Generation bridge subprocess.
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// `[summary]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Block kinds that are considered for summarization.
    #[serde(default = "default_eligible_kinds")]
    pub eligible_kinds: Vec<BlockKind>,

    /// Raw text shorter than this (in characters) falls back to the image
    /// description when one exists.
    #[serde(default = "default_min_context_chars")]
    pub min_context_chars: usize,

    /// Hard cap on the context embedded in a prompt, in characters.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Trimmed summaries shorter than this (in characters) are rejected.
    #[serde(default = "default_min_summary_chars")]
    pub min_summary_chars: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            eligible_kinds: default_eligible_kinds(),
            min_context_chars: default_min_context_chars(),
            max_context_chars: default_max_context_chars(),
            min_summary_chars: default_min_summary_chars(),
        }
    }
}

impl SummaryConfig {
    /// Whether blocks of `kind` are summarized.
    pub fn is_eligible(&self, kind: BlockKind) -> bool {
        self.eligible_kinds.contains(&kind)
    }

    /// Reject limits that would make every prompt empty or let empty
    /// summaries through.
    pub fn validate(&self) -> Result<()> {
        if self.max_context_chars == 0 {
            return Err(BlockwiseError::config(
                "summary.max_context_chars must be greater than zero",
            ));
        }
        if self.min_summary_chars == 0 {
            return Err(BlockwiseError::config(
                "summary.min_summary_chars must be at least 1",
            ));
        }
        Ok(())
    }
}

fn default_eligible_kinds() -> Vec<BlockKind> {
    vec![
        BlockKind::SectionHeader,
        BlockKind::Text,
        BlockKind::TableGroup,
        BlockKind::ListGroup,
        BlockKind::Code,
        BlockKind::Equation,
        BlockKind::Form,
        BlockKind::ComplexRegion,
        BlockKind::FigureGroup,
        BlockKind::PictureGroup,
        BlockKind::Figure,
        BlockKind::Picture,
    ]
}
fn default_min_context_chars() -> usize {
    10
}
fn default_max_context_chars() -> usize {
    2000
}
fn default_min_summary_chars() -> usize {
    5
}

/// `[bridge]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Program that runs the bridge (e.g., "bun").
    #[serde(default = "default_bridge_command")]
    pub command: String,

    /// Arguments passed to the bridge program.
    #[serde(default = "default_bridge_args")]
    pub args: Vec<String>,

    /// Working directory for the bridge subprocess.
    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    /// Model identifier forwarded with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Seconds to wait for a single response before treating it as absent.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: default_bridge_command(),
            args: default_bridge_args(),
            working_dir: default_working_dir(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bridge_command() -> String {
    "bun".into()
}
fn default_bridge_args() -> Vec<String> {
    vec!["run".into(), "bridge/generate.ts".into()]
}
fn default_working_dir() -> String {
    ".".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_request_timeout_secs() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.blockwise/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BlockwiseError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.blockwise/blockwise.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BlockwiseError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        BlockwiseError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.summary.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BlockwiseError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BlockwiseError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BlockwiseError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the generation API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.bridge.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(BlockwiseError::config(format!(
            "generation API key not found. Set the {var_name} environment variable."
        ))),
    }
}
