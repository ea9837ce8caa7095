//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use reportcast_core::pipeline::{ProgressReporter, RunConfig, RunSummary, run_report};
use reportcast_shared::{
    SourceStatus, config_dir, init_config, load_config, resolve_window,
};
use reportcast_storage::Storage;

/// Database file name under the config directory.
const DB_FILE_NAME: &str = "reportcast.db";

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// reportcast — aggregate marketing data into a published report.
#[derive(Parser)]
#[command(
    name = "reportcast",
    version,
    about = "Aggregate marketing and e-commerce data into a combined report and publish it to a knowledge base.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Run the report pipeline for a date window.
    Run {
        /// Window start date (YYYY-MM-DD). Requires --end.
        #[arg(long)]
        start: Option<String>,

        /// Window end date (YYYY-MM-DD). Requires --start.
        #[arg(long)]
        end: Option<String>,

        /// Trailing window length in days, ending today.
        #[arg(long)]
        days: Option<u32>,

        /// Output directory for report files (overrides config).
        #[arg(short, long)]
        out: Option<String>,

        /// Generate report files but push nothing to the knowledge base.
        #[arg(long)]
        skip_publish: bool,
    },

    /// Show recent pipeline runs.
    History {
        /// Maximum number of runs to show.
        #[arg(long, default_value = "10")]
        limit: u32,
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

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "reportcast=info",
        1 => "reportcast=debug",
        _ => "reportcast=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            start,
            end,
            days,
            out,
            skip_publish,
        } => {
            cmd_run(
                start.as_deref(),
                end.as_deref(),
                days,
                out.as_deref(),
                skip_publish,
            )
            .await
        }
        Command::History { limit } => cmd_history(limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(
    start: Option<&str>,
    end: Option<&str>,
    days: Option<u32>,
    out: Option<&str>,
    skip_publish: bool,
) -> Result<()> {
    let config = load_config()?;

    let override_start = parse_date(start)?;
    let override_end = parse_date(end)?;
    let window_days = days.unwrap_or(config.defaults.window_days);
    let window = resolve_window(
        window_days,
        override_start,
        override_end,
        Utc::now().date_naive(),
    )?;

    let output_dir = match out {
        Some(p) => PathBuf::from(p),
        None => PathBuf::from(&config.defaults.output_dir),
    };

    if config.sources.is_empty() {
        return Err(eyre!(
            "no sources configured — add [[sources]] entries to the config file (see `reportcast config show`)"
        ));
    }

    let run_config = RunConfig {
        window,
        sources: config.sources,
        knowledge_base: config.knowledge_base,
        output_dir,
        db_path: config_dir()?.join(DB_FILE_NAME),
        skip_publish,
    };

    info!(%window, skip_publish, "starting report run");

    // Best-effort cancellation: ctrl-C sets the flag, the pipeline stops
    // at the next phase boundary or between publish calls.
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_signal.store(true, Ordering::Relaxed);
        }
    });

    let reporter = CliProgress::new();
    let summary = run_report(&run_config, &reporter, shutdown).await?;
    print_summary(&summary);
    Ok(())
}

fn parse_date(value: Option<&str>) -> Result<Option<NaiveDate>> {
    match value {
        None => Ok(None),
        Some(s) => s
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(|e| eyre!("invalid date '{s}' (expected YYYY-MM-DD): {e}")),
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    if summary.interrupted {
        println!("  Run interrupted by shutdown request.");
    } else {
        println!("  Report run finished.");
    }
    println!("  Run ID: {}", summary.run_id);
    println!(
        "  Window: {} to {}",
        summary.window.start, summary.window.end
    );
    println!("  Sources:");
    for (name, status) in &summary.source_statuses {
        println!("    - {name}: {status}");
    }
    if summary.order_count > 0 {
        println!("  Orders: {}", summary.order_count);
    }
    if let Some(path) = &summary.report_path {
        println!("  Report: {}", path.display());
    }
    if let Some(path) = &summary.detail_path {
        println!("  Detail: {}", path.display());
    }
    match &summary.publish_skipped {
        Some(reason) => println!("  Publishing skipped: {reason}"),
        None => println!(
            "  Published: {}/{} chunks ({} failed)",
            summary.published_ok, summary.chunks_total, summary.published_failed
        ),
    }
    println!("  Time: {:.1}s", summary.elapsed.as_secs_f64());
    println!();
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_fetched(&self, source: &str, status: SourceStatus) {
        self.spinner
            .set_message(format!("Fetched {source} ({status})"));
    }

    fn chunk_published(&self, label: &str, success: bool, current: usize, total: usize) {
        let mark = if success { "ok" } else { "failed" };
        self.spinner
            .set_message(format!("Publishing [{current}/{total}] {label} ({mark})"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// history
// ---------------------------------------------------------------------------

async fn cmd_history(limit: u32) -> Result<()> {
    let db_path = config_dir()?.join(DB_FILE_NAME);
    if !db_path.exists() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    let storage = Storage::open(&db_path).await?;
    let runs = storage.list_runs(limit).await?;

    if runs.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    println!();
    for run in runs {
        let finished = run.finished_at.as_deref().unwrap_or("-");
        println!(
            "  {}  {} to {}  [{}]",
            run.started_at, run.window_start, run.window_end, run.status
        );
        println!("    id: {}  finished: {finished}", run.id);
        if let Some(detail) = &run.detail {
            println!("    {detail}");
        }
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Created config file at {}", path.display());
    println!("Edit it to add [[sources]] and the [knowledge_base] endpoint.");
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let rendered = toml::to_string_pretty(&config)?;
    println!("{rendered}");
    Ok(())
}
