// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Screenshot Renamer: descriptive names for macOS screenshots
//!
//! Scans a directory for screenshot files, describes each capture group
//! with a vision model and renames the files with that description.

use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use screenshot_renamer::batch::{process_groups, BatchSettings};
use screenshot_renamer::catalog::{group_by_timestamp, CaptureGroups, ScreenshotCatalog};
use screenshot_renamer::config::AppConfig;
use screenshot_renamer::cost::CostCalculator;
use screenshot_renamer::session_log::ActionLog;
use screenshot_renamer::vision::AnalysisClient;
use screenshot_renamer::Result;

/// Files listed in the confirmation preview
const PREVIEW_LIMIT: usize = 10;

/// Screenshot Renamer CLI - AI descriptions for screenshot filenames
#[derive(Parser, Debug)]
#[command(name = "screenshot-renamer")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Rename macOS screenshots with AI-generated descriptions", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Describe and rename screenshots (default)
    Rename {
        /// Directory to scan (overrides config and DESKTOP_PATH)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Analyze and log proposed names without renaming
        #[arg(long)]
        dry_run: bool,
    },

    /// List recognized screenshots and the cost estimate (no network)
    Scan {
        /// Directory to scan (overrides config and DESKTOP_PATH)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Check API connectivity and model availability
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration (API key omitted)
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration and target directory
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !cli.quiet {
        info!("Screenshot Renamer v{}", env!("CARGO_PKG_VERSION"));
    }

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Rename { dir, yes, dry_run }) => run_rename(config, dir, yes, dry_run).await,
        Some(Commands::Scan { dir }) => run_scan(config, dir),
        Some(Commands::Status) => run_status(config).await,
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        None => run_rename(config, None, false, false).await,
    }
}

fn with_dir(mut config: AppConfig, dir: Option<PathBuf>) -> AppConfig {
    if let Some(dir) = dir {
        config.desktop_path = Some(dir.to_string_lossy().into_owned());
    }
    config
}

/// Scan, confirm, analyze and rename
async fn run_rename(
    config: AppConfig,
    dir: Option<PathBuf>,
    assume_yes: bool,
    dry_run: bool,
) -> Result<()> {
    let config = with_dir(config, dir);
    config.validate()?;

    if dry_run {
        warn!("DRY RUN MODE - files will not be renamed");
    }

    let costs = Arc::new(CostCalculator::new());
    let client = AnalysisClient::new(&config.api, costs.clone())?;

    info!("Checking API connectivity...");
    let connectivity = client.check_connection().await;
    if connectivity.is_ok() {
        info!("{}", connectivity.message());
    } else {
        warn!("{}", connectivity.message());
        warn!("Continuing anyway; individual requests will report their own errors");
    }

    let mut log = ActionLog::open(config.log_file_path());
    let catalog = ScreenshotCatalog::new(config.desktop_dir());
    info!("Scanning for screenshots in: {}", catalog.dir().display());

    let records = catalog.scan()?;
    log.log_scan_results(records.len());

    if records.is_empty() {
        info!("No screenshot files found. Nothing to do.");
        log.finish();
        return Ok(());
    }

    let total_files = records.len();
    let groups = group_by_timestamp(records);
    let estimate = costs.estimate_grouped(&groups);
    log.log_cost_estimate(&estimate, total_files);

    if !assume_yes {
        print_preview(&groups);
        if !confirm(total_files, dry_run)? {
            info!("Operation cancelled.");
            log.finish();
            return Ok(());
        }
    }

    let settings = BatchSettings::from_config(&config, dry_run);
    let completed = tokio::select! {
        report = process_groups(&groups, &client, &mut log, &settings) => {
            info!(
                "Processed {} groups ({} skipped)",
                report.groups_processed, report.groups_skipped
            );
            true
        }
        _ = shutdown_signal() => false,
    };

    if !completed {
        log.log_error("Operation cancelled by user", None);
    }

    log.log_actual_costs(&costs.actual_costs());
    let summary = log.finish();
    if !dry_run && summary.successful_renames > 0 {
        info!("Renamed {} of {} files", summary.successful_renames, summary.total_files);
    }
    println!("\nLog saved to: {}", log.path().display());

    Ok(())
}

fn print_preview(groups: &CaptureGroups) {
    let records: Vec<_> = groups.values().flatten().collect();

    println!("\nFiles to be processed:");
    for (i, record) in records.iter().take(PREVIEW_LIMIT).enumerate() {
        println!("  {}. {}", i + 1, record.original_name);
    }
    if records.len() > PREVIEW_LIMIT {
        println!("  ... and {} more files", records.len() - PREVIEW_LIMIT);
    }
}

/// Ask on stdin; only `y`/`yes` proceed
fn confirm(total_files: usize, dry_run: bool) -> Result<bool> {
    let verb = if dry_run { "analyze" } else { "rename" };
    print!("\nProceed to {} {} files? (y/N): ", verb, total_files);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, stopping..."),
        _ = terminate => info!("Received SIGTERM, stopping..."),
    }
}

/// Offline listing of what a run would touch
fn run_scan(config: AppConfig, dir: Option<PathBuf>) -> Result<()> {
    let config = with_dir(config, dir);
    let catalog = ScreenshotCatalog::new(config.desktop_dir());
    let records = catalog.scan()?;
    let total_files = records.len();

    if total_files == 0 {
        println!("No screenshot files found in {}", catalog.dir().display());
        return Ok(());
    }

    let groups = group_by_timestamp(records);
    println!("Screenshots in {}:", catalog.dir().display());
    for (key, group) in &groups {
        println!("\n  {} ({} files)", key, group.len());
        for record in group {
            println!("    {}", record.original_name);
        }
    }

    let estimate = CostCalculator::new().estimate_grouped(&groups);
    println!(
        "\n{} files in {} groups ({} API calls instead of {})",
        total_files,
        groups.len(),
        estimate.total_images,
        total_files
    );
    println!("Estimated cost: {}", estimate);

    Ok(())
}

async fn run_status(config: AppConfig) -> Result<()> {
    println!("Screenshot Renamer v{} Status", env!("CARGO_PKG_VERSION"));
    println!("==============================");
    println!("  Endpoint: {}", config.api.base_url);
    println!("  Model: {}", config.api.model);
    println!(
        "  API key: {}",
        if config.api.api_key.is_empty() { "not set" } else { "set" }
    );

    let client = AnalysisClient::new(&config.api, Arc::new(CostCalculator::new()))?;
    let connectivity = client.check_connection().await;
    println!("\n{}", connectivity.message());

    println!("\nConfiguration:");
    println!("  Screenshot directory: {}", config.desktop_dir().display());
    println!("  Log file: {}", config.log_file_path().display());
    println!("  Max retries: {}", config.api.max_retries);
    println!("  Timeout: {}s", config.api.timeout_secs);

    Ok(())
}

fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
            println!("Set OPENAI_API_KEY in your environment before running.");
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Screenshot directory: {}", config.desktop_dir().display());
            println!("  Model: {}", config.api.model);
            println!("  Endpoint: {}", config.api.base_url);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["screenshot-renamer"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("config.json"));
    }

    #[test]
    fn test_cli_rename_command() {
        let cli = Cli::try_parse_from([
            "screenshot-renamer", "rename", "--dry-run", "--yes", "--dir", "/tmp/shots",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Rename { dir, yes, dry_run }) => {
                assert!(dry_run);
                assert!(yes);
                assert_eq!(dir, Some(PathBuf::from("/tmp/shots")));
            }
            _ => panic!("Expected Rename command"),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["screenshot-renamer", "scan", "-v", "-c", "alt.json"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("alt.json"));
        assert!(matches!(cli.command, Some(Commands::Scan { dir: None })));
    }

    #[test]
    fn test_cli_config_generate() {
        let cli = Cli::try_parse_from(["screenshot-renamer", "config", "generate", "-o", "x.json"])
            .unwrap();
        match cli.command {
            Some(Commands::Config { action: ConfigCommands::Generate { output } }) => {
                assert_eq!(output, PathBuf::from("x.json"));
            }
            _ => panic!("Expected config generate"),
        }
    }

    #[test]
    fn test_confirmation_answers() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("yep"));
    }

    #[test]
    fn test_dir_override() {
        let config = with_dir(AppConfig::default(), Some(PathBuf::from("/tmp/shots")));
        assert_eq!(config.desktop_dir(), PathBuf::from("/tmp/shots"));
    }
}
