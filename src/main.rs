//! Review Notifier - monthly customer review summary by email
//!
//! Reads stored review batches, summarises last month's star ratings and
//! sends the summary as an HTML email through a transactional email provider.
//! The run result is printed to stdout as JSON.
//!
//! Exit codes:
//!   0 - Run completed (including a failed delivery, unless --strict)
//!   1 - Configuration or argument error
//!   2 - Report not delivered and --strict was set

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod notify;
mod pipeline;
mod report;
mod source;
mod window;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use notify::{AutopilotNotifier, DryRunNotifier, Notifier};
use pipeline::{ReportPipeline, RunOutcome};
use source::JsonFileSource;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Review Notifier v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .review-notifier.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("Created {} with default settings.", config::CONFIG_FILE);
    println!(
        "Set {} and {} in the environment before sending.",
        config::API_KEY_ENV,
        config::TARGET_EMAIL_ENV
    );
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr; stdout is reserved for the run result.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one report. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let config = load_config(&args)?;
    config.validate(args.dry_run)?;

    let notifier: Box<dyn Notifier> = if args.dry_run {
        info!("Dry run: the report will not be sent");
        Box::new(DryRunNotifier)
    } else {
        Box::new(AutopilotNotifier::new(config.autopilot())?)
    };

    let source = JsonFileSource::new(config.source.records_path.clone());
    let pipeline = ReportPipeline::new(Box::new(source), notifier, config.pipeline_settings()?);

    let outcome = pipeline.run(Utc::now()).await;

    if let Some(ref path) = args.output {
        write_output(&outcome, args.format, path)?;
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("Failed to serialize run result")?
    );

    if args.strict && !outcome.delivered() {
        warn!("Report was not delivered (--strict)");
        return Ok(2);
    }

    Ok(0)
}

/// Write the rendered report for --output.
fn write_output(outcome: &RunOutcome, format: OutputFormat, path: &std::path::Path) -> Result<()> {
    let content = match (format, &outcome.summary, &outcome.html) {
        (OutputFormat::Json, Some(summary), _) => report::generate_json_report(summary)?,
        (OutputFormat::Html, _, Some(html)) => html.clone(),
        _ => {
            warn!("No report was built, skipping {}", path.display());
            return Ok(());
        }
    };

    report::write_report(&content, path)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    info!("Report saved to {}", path.display());

    Ok(())
}

/// Load configuration from file or defaults, then environment and CLI overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        Config::load(config_path)?
    } else {
        match Config::load_default() {
            Ok(Some(config)) => {
                info!("Loaded default config from {}", config::CONFIG_FILE);
                config
            }
            Ok(None) => {
                debug!("No config file found, using defaults");
                Config::default()
            }
            Err(e) => {
                warn!("Failed to load config: {:#}", e);
                Config::default()
            }
        }
    };

    config.apply_env();
    config.merge_with_args(args);

    Ok(config)
}
