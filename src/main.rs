use anyhow::{bail, Context, Result};
use callscope::apis::{ApiStats, DexScreenerClient, RetryPolicy};
use callscope::backfill::{BackfillOptions, BackfillOrchestrator, BackfillProgress, BackfillSettings};
use callscope::config::{get_config_clone, load_config_from_path, Config};
use callscope::database::{ExtremumStore, SqliteStore};
use callscope::entries::{NewEntry, TrackingStatus};
use callscope::logger::{self, LogTag};
use callscope::ohlcvs::OhlcvManager;
use callscope::paths;
use callscope::prices::DexScreenerPriceOracle;
use callscope::refresh::{RefreshLoop, RefreshOutcome};
use callscope::services::{AuditService, RefreshService, ServiceManager};
use callscope::validator::{Severity, Thresholds, ValidationReport, Validator};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{interval, Duration};

/// Historical ATH and drawdown tracking for token calls
#[derive(Parser, Debug)]
#[command(name = "callscope", author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to data/config.toml under the base directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug output for a log tag (repeatable)
    #[arg(long = "debug", global = true, value_name = "TAG")]
    debug: Vec<String>,

    #[arg(long, global = true)]
    verbose: bool,

    /// Database file, overriding the configured path
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a call to track
    Track(TrackArgs),
    /// Change an entry's tracking status
    SetStatus {
        entry_id: i64,
        /// pending, active or inactive
        status: String,
    },
    /// Compute ATH statistics from historical candles
    Backfill(BackfillArgs),
    /// Raise ATHs from live prices
    Refresh {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Audit stored records
    Validate {
        /// Apply deterministic repairs
        #[arg(long)]
        fix: bool,
    },
    /// Show backfill progress
    Status,
    /// Reset backfill progress to idle
    Reset,
    /// Service mode: backfill if needed, then live refresh and periodic audits
    Run,
}

#[derive(Args, Debug)]
struct TrackArgs {
    mint: String,
    #[arg(long)]
    price: f64,
    #[arg(long, conflicts_with = "market_cap")]
    supply: Option<f64>,
    #[arg(long)]
    market_cap: Option<f64>,
    /// Unix seconds of the call (defaults to now)
    #[arg(long)]
    at: Option<i64>,
    /// Register without a fixed entry yet
    #[arg(long)]
    pending: bool,
}

#[derive(Args, Debug, Default)]
struct BackfillArgs {
    #[arg(long)]
    token: Option<String>,
    /// Recompute every matching active entry
    #[arg(long)]
    force: bool,
    /// Also retry entries stored without candle data
    #[arg(long)]
    include_insufficient: bool,
    #[arg(long)]
    limit: Option<usize>,
}

impl From<BackfillArgs> for BackfillOptions {
    fn from(args: BackfillArgs) -> Self {
        BackfillOptions {
            include_insufficient: args.include_insufficient,
            force: args.force,
            token: args.token,
            limit: args.limit,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = paths::ensure_all_directories() {
        eprintln!("Failed to create required directories: {}", e);
        std::process::exit(1);
    }

    let config_path = cli.config.clone().unwrap_or_else(paths::get_config_path);
    if let Err(e) = load_config_from_path(&config_path) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    let config = get_config_clone();

    let mut debug_tags = config.logging.debug_tags.clone();
    debug_tags.extend(cli.debug.iter().cloned());
    logger::init(
        logger::build_logger_config(
            &config.logging.min_level,
            &debug_tags,
            cli.verbose,
            config.logging.file_logging,
        ),
        &paths::get_logs_directory(),
    );

    let code = match execute(cli, config).await {
        Ok(()) => 0,
        Err(e) => {
            logger::error(LogTag::System, &format!("{:#}", e));
            1
        }
    };
    logger::flush();
    std::process::exit(code);
}

async fn execute(cli: Cli, config: Config) -> Result<()> {
    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| paths::resolve_database_path(&config.database_path));
    let store = Arc::new(
        SqliteStore::open(&db_path)
            .with_context(|| format!("opening database {}", paths::display(&db_path)))?,
    );
    logger::debug(
        LogTag::Database,
        &format!("Using database {}", paths::display(&db_path)),
    );

    match cli.command {
        Command::Track(args) => track(&store, args),
        Command::SetStatus { entry_id, status } => set_status(&store, entry_id, &status),
        Command::Backfill(args) => backfill(store, &config, args.into()).await,
        Command::Refresh { once } => refresh(store, &config, once).await,
        Command::Validate { fix } => validate(store, &config, fix),
        Command::Status => {
            print_progress(&store.load_backfill_progress()?.unwrap_or_default());
            Ok(())
        }
        Command::Reset => {
            build_orchestrator(store, ohlcv_manager(&config)?, &config).reset()?;
            println!("Backfill progress reset to idle");
            Ok(())
        }
        Command::Run => run_services(store, config).await,
    }
}

fn track(store: &SqliteStore, args: TrackArgs) -> Result<()> {
    if !args.price.is_finite() || args.price <= 0.0 {
        bail!("entry price must be positive, got {}", args.price);
    }
    let entry = NewEntry {
        token_id: args.mint.clone(),
        entry_price: Some(args.price),
        entry_supply: args.supply,
        entry_market_cap: args.market_cap,
        entry_time: args.at.unwrap_or_else(|| Utc::now().timestamp()),
        status: if args.pending {
            TrackingStatus::Pending
        } else {
            TrackingStatus::Active
        },
    };
    let id = store.insert_entry(&entry)?;
    println!("Tracking entry {} for {} at {}", id, args.mint, args.price);
    Ok(())
}

fn set_status(store: &SqliteStore, entry_id: i64, status: &str) -> Result<()> {
    let Some(status) = TrackingStatus::parse(status) else {
        bail!("unknown status '{}', expected pending, active or inactive", status);
    };
    store.set_entry_status(entry_id, status)?;
    println!("Entry {} is now {}", entry_id, status);
    Ok(())
}

fn dexscreener(config: &Config) -> Result<Arc<DexScreenerClient>> {
    let timeout = Duration::from_secs(config.ohlcv.request_timeout_secs);
    Ok(Arc::new(DexScreenerClient::new(&config.ohlcv.network, timeout)?))
}

fn ohlcv_manager(config: &Config) -> Result<Arc<OhlcvManager>> {
    Ok(Arc::new(OhlcvManager::new(
        &config.ohlcv,
        dexscreener(config)?,
        RetryPolicy::from_config(&config.retry),
    )?))
}

fn build_orchestrator(
    store: Arc<SqliteStore>,
    source: Arc<OhlcvManager>,
    config: &Config,
) -> Arc<BackfillOrchestrator> {
    Arc::new(BackfillOrchestrator::new(
        store,
        source,
        BackfillSettings::from_config(config),
    ))
}

fn build_refresh(store: Arc<SqliteStore>, config: &Config) -> Result<Arc<RefreshLoop>> {
    let oracle = DexScreenerPriceOracle::new(
        dexscreener(config)?,
        RetryPolicy::from_config(&config.retry),
        config.refresh.price_batch_size,
    );
    Ok(Arc::new(RefreshLoop::new(
        store,
        Arc::new(oracle),
        config.validator.time_tolerance_secs,
    )))
}

/// Ctrl-C wakes whoever waits on the returned notifier
fn install_ctrlc() -> Result<Arc<Notify>> {
    let signal = Arc::new(Notify::new());
    let notify = signal.clone();
    ctrlc::set_handler(move || {
        logger::info(LogTag::System, "Ctrl-C received, shutting down");
        notify.notify_one();
    })
    .context("installing Ctrl-C handler")?;
    Ok(signal)
}

/// Run a backfill to completion, reporting progress and honoring Ctrl-C
async fn drive_backfill(
    orchestrator: &Arc<BackfillOrchestrator>,
    options: BackfillOptions,
    ctrl_c: &Notify,
) -> Result<BackfillProgress> {
    let mut handle = orchestrator.start(options)?;
    let mut report = interval(Duration::from_secs(15));
    report.tick().await;

    loop {
        tokio::select! {
            done = &mut handle => return Ok(done?),
            _ = ctrl_c.notified() => orchestrator.stop(),
            _ = report.tick() => {
                let p = orchestrator.get_progress();
                logger::info(
                    LogTag::Backfill,
                    &format!(
                        "{:.1}% ({}/{} tokens), eta {}",
                        p.percent_complete(),
                        p.processed_groups,
                        p.total_groups,
                        p.eta_secs.map_or("-".to_string(), |s| format!("{:.0}s", s))
                    ),
                );
            }
        }
    }
}

async fn backfill(store: Arc<SqliteStore>, config: &Config, options: BackfillOptions) -> Result<()> {
    let ctrl_c = install_ctrlc()?;
    let source = ohlcv_manager(config)?;
    let orchestrator = build_orchestrator(store, source.clone(), config);
    let progress = drive_backfill(&orchestrator, options, &ctrl_c).await?;
    print_progress(&progress);
    print_provider_stats(&source.provider_stats().await);
    Ok(())
}

async fn refresh(store: Arc<SqliteStore>, config: &Config, once: bool) -> Result<()> {
    let refresh = build_refresh(store, config)?;

    if once {
        match refresh.run_cycle().await {
            RefreshOutcome::Completed(stats) => println!(
                "{} entries, {} prices: {} raised, {} created, {} unchanged, {} without price",
                stats.entries, stats.prices_found, stats.raised, stats.created, stats.unchanged, stats.no_price
            ),
            RefreshOutcome::Skipped(reason) => println!("Skipped: {}", reason),
        }
        return Ok(());
    }

    let ctrl_c = install_ctrlc()?;
    let shutdown = Arc::new(Notify::new());
    let period = Duration::from_secs(config.refresh.interval_secs.max(1));
    let task = tokio::spawn(refresh.run(period, shutdown.clone()));
    ctrl_c.notified().await;
    shutdown.notify_waiters();
    task.abort();
    Ok(())
}

fn validate(store: Arc<SqliteStore>, config: &Config, fix: bool) -> Result<()> {
    let validator = Validator::new(store, Thresholds::from(&config.validator));
    let report = validator.validate(fix)?;
    print_report(&report);
    Ok(())
}

async fn run_services(store: Arc<SqliteStore>, config: Config) -> Result<()> {
    let ctrl_c = install_ctrlc()?;

    let orchestrator = build_orchestrator(store.clone(), ohlcv_manager(&config)?, &config);
    if !orchestrator.get_progress().is_complete() {
        logger::info(LogTag::System, "Backfill not complete, running it first");
        let progress = drive_backfill(&orchestrator, BackfillOptions::default(), &ctrl_c).await?;
        if !progress.is_complete() {
            logger::warning(
                LogTag::System,
                &format!("Backfill ended {}, not starting services", progress.status),
            );
            return Ok(());
        }
    }

    let mut manager = ServiceManager::new(config.clone());
    manager.register(Box::new(RefreshService::new(
        build_refresh(store.clone(), &config)?,
        Duration::from_secs(config.refresh.interval_secs),
    )));
    manager.register(Box::new(AuditService::new(
        Arc::new(Validator::new(store, Thresholds::from(&config.validator))),
        Duration::from_secs(config.validator.audit_interval_secs),
        config.validator.auto_fix,
    )));

    manager.start_all().await.map_err(anyhow::Error::msg)?;
    ctrl_c.notified().await;
    manager.stop_all().await;
    Ok(())
}

fn print_progress(p: &BackfillProgress) {
    println!("{} {} ({})", "Backfill:".bold(), p.status, p.phase);
    println!(
        "  tokens  {}/{} ({:.1}%)",
        p.processed_groups,
        p.total_groups,
        p.percent_complete()
    );
    println!(
        "  entries {} processed of {}: {} ok, {} insufficient, {} failed, {} skipped",
        p.processed_entries, p.total_entries, p.succeeded, p.insufficient, p.failed, p.skipped
    );
    println!("  elapsed {:.0}s", p.elapsed_secs);
    if let Some(eta) = p.eta_secs.filter(|_| p.is_running()) {
        println!("  eta     {:.0}s", eta);
    }
    if !p.active_tokens.is_empty() {
        println!("  active  {}", p.active_tokens.join(", "));
    }
    if let Some(error) = &p.last_error {
        println!("  {} {}", "last error:".red(), error);
    }
}

fn print_provider_stats(stats: &[(&str, ApiStats)]) {
    for (provider, s) in stats.iter().filter(|(_, s)| s.total_requests > 0) {
        println!(
            "  {:<14} {} requests, {:.1}% ok, {} rate limited, avg {:.0}ms",
            provider,
            s.total_requests,
            s.success_rate(),
            s.rate_limited,
            s.average_response_time_ms
        );
        if let Some(error) = &s.last_error {
            println!("  {:<14} {} {}", "", "last error:".dimmed(), error);
        }
    }
}

fn print_report(report: &ValidationReport) {
    for v in &report.violations {
        let severity = match v.severity {
            Severity::Critical => v.severity.as_str().bright_red().bold(),
            Severity::High => v.severity.as_str().red(),
            Severity::Medium => v.severity.as_str().yellow(),
            Severity::Low => v.severity.as_str().dimmed(),
        };
        println!(
            "[{}] {} entry {} {}: {}",
            severity,
            v.kind,
            v.entry_id,
            v.token_id.as_deref().unwrap_or("-"),
            v.message
        );
    }

    println!(
        "{} {} checked, {} auditable, {} with records, {} violations, {} fixed",
        "Audit:".bold(),
        report.entries_checked,
        report.auditable_entries,
        report.entries_with_record,
        report.violations.len(),
        report.records_fixed
    );
    for (kind, count) in &report.by_kind {
        println!("  {:<20} {}", kind.as_str(), count);
    }
    println!("Health score: {:.1}", report.health_score);
}
