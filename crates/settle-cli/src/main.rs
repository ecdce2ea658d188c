//! # settle
//!
//! Binary entry point for the settlement verification harness.
//!
//! This crate provides:
//! - CLI argument parsing using `clap`
//! - Configuration loading with CLI overrides
//! - Entry point to the scenario orchestrator
//! - Suite inspection via `settle check` and `settle run --list`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use settle_cli::suite;
use settle_core::{HarnessConfig, HttpLedger, Orchestrator};

/// Settlement verification harness for eventually-consistent token ledgers.
#[derive(Parser, Debug)]
#[command(name = "settle", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, default_value = "settle.yml", global = true)]
    config: PathBuf,

    /// Override the backend base URL from the config
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scenario suite (default if no subcommand given)
    Run(RunArgs),

    /// Validate the configuration and show the effective suite
    Check,
}

/// Arguments for the run subcommand.
#[derive(Parser, Debug, Default)]
struct RunArgs {
    /// Run only scenarios whose name contains this substring
    #[arg(short, long)]
    scenario: Option<String>,

    /// List scenario names without running anything
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&cli.config, cli.base_url.as_deref())?;

    match cli.command {
        Some(Commands::Check) => check_command(&config),
        Some(Commands::Run(args)) => run_command(config, args).await,
        None => run_command(config, RunArgs::default()).await,
    }
}

/// Loads configuration, falling back to defaults when the file is absent,
/// then applies CLI overrides.
fn load_config(path: &Path, base_url: Option<&str>) -> Result<HarnessConfig> {
    let mut config = if path.exists() {
        HarnessConfig::from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?
    } else {
        warn!("config file {} not found, using defaults", path.display());
        HarnessConfig::default()
    };

    if let Some(url) = base_url {
        config.base_url = url.to_string();
    }
    config.validate().context("configuration invalid")?;
    Ok(config)
}

async fn run_command(config: HarnessConfig, args: RunArgs) -> Result<()> {
    let suite = select_scenarios(&config, args.scenario.as_deref())?;
    if suite.is_empty() {
        anyhow::bail!(
            "no scenario matches {:?}",
            args.scenario.as_deref().unwrap_or("")
        );
    }

    if args.list {
        for scenario in &suite {
            println!("{}", scenario.name);
        }
        return Ok(());
    }

    info!(
        base_url = %config.base_url,
        scenarios = suite.len(),
        "starting suite"
    );

    let backend = HttpLedger::new(&config).context("building ledger client")?;
    let orchestrator = Orchestrator::new(Arc::new(backend), config);
    let report = orchestrator.run_suite(&suite).await;

    print!("{}", report.render());
    std::process::exit(report.exit_code());
}

fn check_command(config: &HarnessConfig) -> Result<()> {
    let rendered = serde_yaml::to_string(config).context("rendering effective config")?;
    println!("# effective configuration\n{rendered}");

    println!("# suite");
    for scenario in suite::built_in(config)? {
        let group = scenario
            .group
            .as_deref()
            .map(|g| format!(" [group: {g}]"))
            .unwrap_or_default();
        println!("{} ({} steps){group}", scenario.name, scenario.steps.len());
    }
    Ok(())
}

fn select_scenarios(
    config: &HarnessConfig,
    filter: Option<&str>,
) -> Result<Vec<settle_core::Scenario>> {
    let mut suite = suite::built_in(config)?;
    if let Some(needle) = filter {
        suite.retain(|s| s.name.contains(needle));
    }
    Ok(suite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_config_falls_back_to_defaults_with_override() {
        let config =
            load_config(Path::new("/nonexistent/settle.yml"), Some("http://ledger.test")).unwrap();
        assert_eq!(config.base_url, "http://ledger.test");
        assert_eq!(config.poll.max_attempts, 6);
    }

    #[test]
    fn config_file_wins_except_for_cli_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "base_url: http://from-file:8080\npoll:\n  max_attempts: 3\n").unwrap();

        let config = load_config(file.path(), Some("http://from-cli:9090")).unwrap();
        assert_eq!(config.base_url, "http://from-cli:9090");
        assert_eq!(config.poll.max_attempts, 3);
    }

    #[test]
    fn scenario_filter_is_substring_match() {
        let config = HarnessConfig::default();
        let transfers = select_scenarios(&config, Some("transfer")).unwrap();
        assert!(!transfers.is_empty());
        assert!(transfers.iter().all(|s| s.name.contains("transfer")));

        let none = select_scenarios(&config, Some("no-such-scenario")).unwrap();
        assert!(none.is_empty());
    }
}
