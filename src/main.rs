use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use site_organizer::models::SETTINGS_FILE;
use site_organizer::services::{FolderOpener, NoopOpener};
use site_organizer::{
    emit_report, AppConfig, EventSender, Mode, Organizer, Report, ReportFormat, RunEvent, Settings,
};
use std::env;
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

const SETTINGS_ENV: &str = "SITE_ORGANIZER_SETTINGS";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let matches = Command::new("Site Organizer")
        .version("1.0")
        .about("Reorganizes archaeological site folders into a destination tree")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("analyze")
                .about("List site folders and count the files a run would copy")
                .args(common_args()),
        )
        .subcommand(
            Command::new("run")
                .about("Copy every matching file and write the copy report")
                .args(common_args())
                .args(report_args()),
        )
        .get_matches();

    let (command, sub_matches) = matches
        .subcommand()
        .context("A subcommand is required")?;

    let log_level = sub_matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| "info".to_string());

    // Initialize logging
    initialize_logging(&log_level)?;

    // Load environment variables
    load_environment_variables();

    let settings_path = settings_path(sub_matches);
    let settings = Settings::load(&settings_path)?;
    let mut config = create_app_config(sub_matches, &settings)?;
    config.log_level = log_level;

    match command {
        "analyze" => analyze(config),
        "run" => {
            run_application(config.clone()).await?;
            config
                .to_settings(&settings)
                .save(&settings_path)
                .with_context(|| format!("Failed to save settings to {:?}", settings_path))
        }
        other => anyhow::bail!("Unknown subcommand: {}", other),
    }
}

fn common_args() -> Vec<Arg> {
    vec![
        Arg::new("source")
            .long("source")
            .short('s')
            .value_name("DIR")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Source root containing the site folders"),
        Arg::new("destination")
            .long("destination")
            .short('d')
            .value_name("DIR")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Destination root for the reorganized tree"),
        Arg::new("mode")
            .long("mode")
            .short('m')
            .value_name("MODE")
            .help("Exclusion mode: backup, report-structure or images"),
        Arg::new("extensions")
            .long("extensions")
            .value_name("LIST")
            .help("Comma separated extension allow-list (empty copies everything)"),
        Arg::new("exclude")
            .long("exclude")
            .value_name("FOLDER")
            .action(ArgAction::Append)
            .help("Additional folder name to exclude (repeatable)"),
        Arg::new("settings")
            .long("settings")
            .value_name("FILE")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Settings file (defaults to $SITE_ORGANIZER_SETTINGS or config.json)"),
        Arg::new("log-level")
            .long("log-level")
            .value_name("LEVEL")
            .help("Set the log level (trace, debug, info, warn, error)")
            .default_value("info"),
    ]
}

fn report_args() -> Vec<Arg> {
    vec![
        Arg::new("concurrency")
            .long("concurrency")
            .short('j')
            .value_name("N")
            .value_parser(clap::value_parser!(usize))
            .help("Number of concurrent copy workers"),
        Arg::new("report-format")
            .long("report-format")
            .value_name("FORMAT")
            .help("Report format: csv, xlsx or both"),
        Arg::new("report-dir")
            .long("report-dir")
            .value_name("DIR")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Directory for report files (defaults to <destination>/reports)"),
        Arg::new("no-report")
            .long("no-report")
            .help("Do not write report files")
            .action(ArgAction::SetTrue),
    ]
}

fn settings_path(matches: &ArgMatches) -> PathBuf {
    matches
        .get_one::<PathBuf>("settings")
        .cloned()
        .or_else(|| env::var(SETTINGS_ENV).ok().filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE))
}

/// Persisted settings first, then whatever was given on the command line
fn create_app_config(matches: &ArgMatches, settings: &Settings) -> Result<AppConfig> {
    let mut config = AppConfig::from_settings(settings);

    if let Some(source) = matches.get_one::<PathBuf>("source") {
        config.organizer.source_root = source.clone();
    }
    if let Some(destination) = matches.get_one::<PathBuf>("destination") {
        config.organizer.destination_root = destination.clone();
    }
    if let Some(mode) = matches.get_one::<String>("mode") {
        config.organizer.mode = mode.parse::<Mode>()?;
    }
    if let Some(extensions) = matches.get_one::<String>("extensions") {
        config.organizer.extensions = Some(
            extensions
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        );
    }
    if let Some(excluded) = matches.get_many::<String>("exclude") {
        config.organizer.extra_exclusions = excluded.cloned().collect();
    }

    // Report flags only exist on `run`
    if let Ok(Some(concurrency)) = matches.try_get_one::<usize>("concurrency") {
        config.organizer.concurrency = *concurrency;
    }
    if let Ok(Some(format)) = matches.try_get_one::<String>("report-format") {
        config.report.format = format.parse::<ReportFormat>()?;
    }
    if let Ok(Some(directory)) = matches.try_get_one::<PathBuf>("report-dir") {
        config.report.directory = Some(directory.clone());
    }
    if let Ok(Some(true)) = matches.try_get_one::<bool>("no-report") {
        config.report.enabled = false;
    }

    Ok(config)
}

/// Initialize structured logging with tracing
fn initialize_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}

fn load_environment_variables() {
    // Load .env file if it exists
    if dotenvy::dotenv().is_err() {
        info!("No .env file found, using system environment variables");
    }
}

fn analyze(config: AppConfig) -> Result<()> {
    let organizer = Organizer::new(config.organizer)?;
    let summary = organizer.analyze()?;

    info!("=== ANALYSIS ===");
    info!("Site folders: {}", summary.site_roots.len());
    info!("Items found: {}", summary.total_items);
    info!("Files to copy: {}", summary.copyable);
    Ok(())
}

async fn run_application(config: AppConfig) -> Result<()> {
    info!("Starting site organizer");
    info!("Configuration: {:#?}", config);

    let organizer = Organizer::new(config.organizer.clone())?;

    let cancel_handle = organizer.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing copies in flight");
            cancel_handle.cancel();
        }
    });

    let (events, rx) = EventSender::channel();
    let drain = tokio::spawn(log_events(rx));

    let report = organizer.run(events).await?;
    if let Err(e) = drain.await {
        error!("Event logger failed: {}", e);
    }

    print_run_report(&report);

    if config.report.enabled && !report.outcomes.is_empty() {
        let sinks = config.report.sinks(&config.organizer.destination_root);
        emit_report(&report, &sinks)?;
    }

    NoopOpener.open(&config.organizer.destination_root);

    info!("Site organizer completed");
    Ok(())
}

/// Log progress in ten percent steps; failures are already logged by the aggregator
async fn log_events(mut rx: tokio::sync::mpsc::UnboundedReceiver<RunEvent>) {
    let mut last_step = None;
    while let Some(event) = rx.recv().await {
        match &event {
            RunEvent::Progress { .. } => {
                let step = event.percent().unwrap_or(0) / 10;
                if last_step != Some(step) {
                    last_step = Some(step);
                    info!("{}", event);
                }
            }
            RunEvent::Cancelled { .. } => warn!("{}", event),
            RunEvent::Started { .. } | RunEvent::Finished { .. } => info!("{}", event),
            RunEvent::SiteStarted { .. } | RunEvent::Failure { .. } => {}
        }
    }
}

fn print_run_report(report: &Report) {
    info!("=== COPY REPORT ===");
    info!("Items found: {}", report.total_items);
    info!("Total files processed: {}", report.total_processed());
    info!("Successfully copied: {}", report.copied_count);
    info!("Skipped files: {}", report.skipped_count);
    info!("Copy errors: {}", report.error_count);
    info!("Unique sites: {}", report.unique_sites());
    info!("Success rate: {:.2}%", report.success_rate() * 100.0);

    for (site, count) in &report.per_site {
        info!("  {}: {}", site, count);
    }

    if report.cancelled {
        warn!("Run cancelled, {} items were not dispatched", report.not_dispatched);
    }

    if report.error_count > 0 {
        error!("Copy errors encountered:");
        for failure in report.failures() {
            error!(
                "  {}: {}",
                failure.source_path.display(),
                failure.status.error_message().unwrap_or_default()
            );
        }
    }
}
