//! LendWatch - Multi-source company monitoring for lending decisions
//!
//! A CLI tool that crawls reviews, news, social media and company websites,
//! analyzes each source with a language model and writes a lending risk
//! report per company.
//!
//! Exit codes:
//!   0 - Success (rating below threshold, or no --fail-on set)
//!   1 - Runtime error (config, every source failed, cancellation, etc.)
//!   2 - Risk rating at or above the --fail-on threshold

mod analysis;
mod analyzer;
mod batch;
mod cli;
mod config;
mod error;
mod fetcher;
mod models;
mod monitor;
mod orchestrator;
mod report;
mod retry;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, FailOnLevel};
use config::{Config, DEFAULT_CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::{MonitoringRequest, RiskRating};
use orchestrator::MonitoringOrchestrator;
use report::ReportWriter;
use retry::RetryPolicy;
use std::path::Path;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Research type recorded in report headers and file names.
const REPORT_TAG: &str = "monitoring";

#[tokio::main]
async fn main() -> Result<()> {
    // Keys usually live in a local .env file
    dotenvy::dotenv().ok();

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

    // Initialize logging
    if let Err(e) = init_logging(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    info!("LendWatch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    match run(args, cancel).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Monitoring failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .lendwatch.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize sources, model, retries, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) -> Result<()> {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Cancel the run on Ctrl-C; in-flight sources are aborted and awaited.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n⚠️  Interrupted, cancelling in-flight monitoring...");
            cancel.cancel();
        }
    });
}

/// Run single-company or batch monitoring. Returns exit code (0 or 2).
async fn run(args: Args, cancel: CancellationToken) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    let orchestrator = MonitoringOrchestrator::from_config(&config)?;
    let writer = ReportWriter::new(&config.general.output_dir, REPORT_TAG);

    if !args.quiet {
        println!("🤖 Initializing monitoring agents...");
        println!("   Model: {}", orchestrator.model_name());
        println!("   Crawler: {}", config.fetcher.base_url);
        println!(
            "   Sources: {}",
            orchestrator
                .kinds()
                .iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        let retry = RetryPolicy::from(&config.retry);
        println!(
            "   Retries: {} attempts, up to {:.1}s backoff per call",
            retry.max_attempts(),
            retry.worst_case_delay().as_secs_f64()
        );
        println!("   Timeout: {}s", config.monitoring.run_timeout_seconds);
        println!("   Output: {}", writer.output_dir().display());
    }

    let worst = match args.batch {
        Some(ref path) => {
            run_batch_mode(&args, &config, &orchestrator, &writer, path, &cancel).await?
        }
        None => run_single(&args, &orchestrator, &writer, cancel).await?,
    };

    Ok(fail_on_exit_code(args.fail_on, worst))
}

async fn run_single(
    args: &Args,
    orchestrator: &MonitoringOrchestrator,
    writer: &ReportWriter,
    cancel: CancellationToken,
) -> Result<Option<RiskRating>> {
    let company = args.company.clone().unwrap_or_default();
    let request =
        MonitoringRequest::new(company, args.location.clone(), args.website.clone())?;

    if !args.quiet {
        println!("\n🔬 Monitoring {}...", request.company_name());
    }
    let start_time = Instant::now();

    let report = orchestrator.run(&request, cancel).await?;

    if !args.quiet {
        println!("\n📝 Generating report...");
    }
    let written = writer.write(&report)?;

    let tally = report.tally();
    println!("\n📊 Monitoring Summary:");
    println!(
        "   Sources: ✅ Ok: {} | ⚠️ Partial: {} | ❌ Failed: {}",
        tally.ok, tally.partial, tally.failed
    );
    match report.summary {
        Some(ref summary) => println!(
            "   Risk rating: {} {}",
            summary.risk_rating.emoji(),
            summary.risk_rating
        ),
        None => println!(
            "   Risk rating: unavailable ({})",
            report.summary_error.as_deref().unwrap_or("unknown error")
        ),
    }
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    println!(
        "\n✅ Monitoring complete! Reports saved to:\n   {}\n   {}",
        written.json_path.display(),
        written.text_path.display()
    );

    Ok(report.risk_rating())
}

async fn run_batch_mode(
    args: &Args,
    config: &Config,
    orchestrator: &MonitoringOrchestrator,
    writer: &ReportWriter,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<Option<RiskRating>> {
    let companies = batch::load_companies(path)?;
    println!(
        "\n📋 Monitoring {} companies from {}",
        companies.len(),
        path.display()
    );

    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(companies.len() as u64);
        match ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            Ok(style) => bar.set_style(style.progress_chars("#>-")),
            Err(e) => warn!("Invalid progress template: {}", e),
        }
        bar
    };

    let summary = batch::run_batch(
        orchestrator,
        writer,
        &companies,
        config.monitoring.batch_concurrency,
        cancel,
        &progress,
    )
    .await;
    progress.finish_and_clear();

    let summary_path = writer.write_batch_summary(&summary, Utc::now())?;

    println!("\n📊 Batch Summary:");
    println!("   Total: {}", summary.total_companies);
    println!(
        "   ✅ Successful: {} | ❌ Failed: {}",
        summary.successful, summary.failed
    );
    for outcome in &summary.companies {
        match (outcome.risk_rating, outcome.error.as_deref()) {
            (Some(rating), _) => {
                println!("   {} {}: {}", rating.emoji(), outcome.name, rating)
            }
            (None, Some(err)) => println!("   ❌ {}: {}", outcome.name, err),
            (None, None) => println!("   ⚪ {}: no rating", outcome.name),
        }
    }
    println!(
        "\n✅ Batch complete! Summary saved to: {}",
        summary_path.display()
    );

    if cancel.is_cancelled() {
        anyhow::bail!("Batch interrupted before every company finished");
    }

    Ok(summary.worst_rating())
}

/// Exit code for `rating` under `--fail-on`.
fn fail_on_exit_code(fail_on: Option<FailOnLevel>, rating: Option<RiskRating>) -> i32 {
    match (fail_on, rating) {
        (Some(level), Some(rating)) if level.is_met_by(rating) => {
            eprintln!(
                "\n⛔ Risk rating {} is at or above {:?}. Failing (exit code 2).",
                rating, level
            );
            2
        }
        _ => 0,
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
