//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use blockwise_core::bridge::BridgeBackend;
use blockwise_core::pipeline::{SummaryProgress, run_summaries};
use blockwise_core::{build_requests, derive_context};
use blockwise_shared::{
    AppConfig, BlockwiseError, Document, init_config, load_config, load_config_from,
    validate_api_key,
};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Blockwise — per-block summaries for structured documents.
#[derive(Parser)]
#[command(
    name = "blockwise",
    version,
    about = "Summarize the content blocks of a structured document with a generation backend.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.blockwise/blockwise.toml.
    #[arg(long, global = true, env = "BLOCKWISE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Summarize every eligible block and write the enriched document.
    Summarize {
        /// Document JSON to enrich.
        input: PathBuf,

        /// Output path (defaults to <input>.summarized.json).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Model identifier, overriding the config file.
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Show the requests that would be sent, without calling a backend.
    Prompts {
        /// Document JSON to inspect.
        input: PathBuf,

        /// Print full prompts instead of context previews.
        #[arg(long)]
        full: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout stays
/// clean for command output.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "blockwise=info",
        1 => "blockwise=debug",
        _ => "blockwise=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Summarize { input, out, model } => {
            cmd_summarize(config_path, &input, out.as_deref(), model.as_deref()).await
        }
        Command::Prompts { input, full } => cmd_prompts(config_path, &input, full).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// `report.json` → `report.summarized.json`.
fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("summarized.json")
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_summarize(
    config_path: Option<&Path>,
    input: &Path,
    out: Option<&Path>,
    model: Option<&str>,
) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(model) = model {
        config.bridge.model = model.to_string();
    }
    validate_api_key(&config)?;

    let mut document = Document::load(input)?;
    let out_path = out.map(PathBuf::from).unwrap_or_else(|| default_output_path(input));

    info!(
        input = %input.display(),
        out = %out_path.display(),
        model = %config.bridge.model,
        "summarizing document"
    );

    let reporter = CliProgress::new();
    reporter.phase("Starting generation bridge");
    let mut bridge = BridgeBackend::spawn(&config.bridge).await?;

    let run = run_summaries(
        &mut document,
        &config.summary,
        &mut bridge,
        Duration::from_secs(config.bridge.request_timeout_secs),
        &reporter,
    )
    .await;

    reporter.phase("Shutting down generation bridge");
    let usage = bridge.shutdown().await?;
    reporter.finish();
    let report = run?;

    let json = serde_json::to_string_pretty(&document)?;
    std::fs::write(&out_path, json).map_err(|e| BlockwiseError::io(&out_path, e))?;

    println!();
    println!("  Document summarized!");
    println!("  Blocks:     {}", report.blocks_total);
    println!("  Requests:   {}", report.requests);
    println!("  Accepted:   {}", report.accepted);
    println!("  Rejected:   {}", report.rejected);
    println!("  Tokens:     {} in / {} out", usage.tokens_in, usage.tokens_out);
    println!("  Output:     {}", out_path.display());
    println!("  Time:       {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_prompts(config_path: Option<&Path>, input: &Path, full: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    config.summary.validate()?;
    let document = Document::load(input)?;

    let requests = build_requests(&document, &config.summary);
    info!(
        blocks = document.block_count(),
        requests = requests.len(),
        "selected blocks"
    );

    for (idx, request) in requests.iter().enumerate() {
        let block = document
            .block(request.block)
            .ok_or_else(|| eyre!("request {idx} targets missing block {}", request.block))?;

        println!(
            "[{}] {} page={} kind={} prompt_chars={}",
            idx + 1,
            request.block,
            request.page_id,
            block.kind,
            request.prompt.chars().count()
        );

        if full {
            println!("{}", request.prompt);
        } else if let Some(context) = derive_context(block, &config.summary) {
            let preview: String = context.chars().take(120).collect();
            let ellipsis = if context.chars().count() > 120 { "..." } else { "" };
            println!("    {}{ellipsis}", preview.replace('\n', " "));
        }
    }

    println!();
    println!(
        "  {} of {} blocks selected",
        requests.len(),
        document.block_count()
    );
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl SummaryProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn task_progress(&self, current: usize, total: usize, detail: &str) {
        self.spinner
            .set_message(format!("Summarizing [{current}/{total}] {detail}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_path_adds_suffix() {
        assert_eq!(
            default_output_path(Path::new("out/report.json")),
            PathBuf::from("out/report.summarized.json")
        );
        assert_eq!(
            default_output_path(Path::new("report")),
            PathBuf::from("report.summarized.json")
        );
    }

    #[test]
    fn cli_parses_summarize() {
        let cli = Cli::try_parse_from([
            "blockwise",
            "-vv",
            "summarize",
            "doc.json",
            "--model",
            "gemini-2.0-flash",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Summarize { input, out, model } => {
                assert_eq!(input, PathBuf::from("doc.json"));
                assert!(out.is_none());
                assert_eq!(model.as_deref(), Some("gemini-2.0-flash"));
            }
            _ => panic!("expected summarize"),
        }
    }

    #[test]
    fn cli_parses_prompts_with_config() {
        let cli = Cli::try_parse_from([
            "blockwise",
            "prompts",
            "doc.json",
            "--full",
            "--config",
            "/tmp/bw.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/bw.toml")));
        assert!(matches!(cli.command, Command::Prompts { full: true, .. }));
    }
}
