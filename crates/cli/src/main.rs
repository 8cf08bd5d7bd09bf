//! # Gatehouse CLI
//!
//! Operations tooling for the Gatehouse session core. The HTTP surface
//! lives in its own deployment; this binary manages the data layer.
//!
//! ## Usage
//!
//! ```bash
//! gatehouse migrate            # Run database migrations
//! gatehouse migrate --rollback # Roll back the last migration
//! gatehouse validate           # Validate configuration (and probe the store)
//! gatehouse sweep              # One-shot GC of settled credential records
//! gatehouse sweep -i 3600      # Periodic GC every hour
//! gatehouse --help             # Show help
//! ```

use std::{sync::Arc, time::Duration};

use clap::{Args, CommandFactory as _, Parser, Subcommand};
use error::Result;
use migration::MigratorTrait;
use server::{config::AppConfig, mailer::LogMailer, maintenance, AppState};

/// Gatehouse - authentication & session core operations
#[derive(Parser, Debug)]
#[command(name = "gatehouse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (debug, info, warn, error)
    #[arg(short = 'L', long, env = "RUST_LOG", default_value = "info")]
    log_level: String,

    /// Output format (json, pretty, compact)
    #[arg(short, long, env = "GATEHOUSE_LOG_FORMAT", default_value = "pretty")]
    log_format: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run database migrations
    Migrate(MigrateArgs),

    /// Validate configuration and optionally probe the store
    Validate(ValidateArgs),

    /// Garbage-collect settled credential records
    Sweep(SweepArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
struct MigrateArgs {
    /// Roll back the last migration instead of applying
    #[arg(long)]
    rollback: bool,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Also probe database connectivity through the guard
    #[arg(long)]
    probe: bool,

    /// Maximum seconds to wait for the probe
    #[arg(long, default_value = "15")]
    probe_timeout: u64,
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// Repeat the sweep every N seconds instead of running once
    #[arg(short, long)]
    interval: Option<u64>,
}

#[derive(Args, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: clap_complete::Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level, &cli.log_format, None)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    match cli.command {
        Commands::Migrate(args) => migrate(&args).await?,
        Commands::Validate(args) => validate(&args).await?,
        Commands::Sweep(args) => sweep(&args).await?,
        Commands::Completions(args) => completions(&args),
    }

    Ok(())
}

async fn migrate(args: &MigrateArgs) -> Result<()> {
    let database = server::config::DatabaseSettings::from_env();

    logging::info!(target: "migrate", host = %database.host, name = %database.name, "Connecting to database...");

    let db = migration::connect(&database.url())
        .await
        .map_err(|e| error::AppError::migration(format!("Failed to connect to database: {}", e)))?;

    if args.rollback {
        logging::info!(target: "migrate", "Rolling back the last migration...");
        migration::Migrator::down(&db, Some(1))
            .await
            .map_err(|e| error::AppError::migration(format!("Rollback failed: {}", e)))?;
        logging::info!(target: "migrate", "Rollback completed successfully");
        return Ok(());
    }

    migration::Migrator::up(&db, None)
        .await
        .map_err(|e| error::AppError::migration(format!("Migration failed: {}", e)))?;

    logging::info!(target: "migrate", "Migrations completed successfully");
    Ok(())
}

async fn validate(args: &ValidateArgs) -> Result<()> {
    logging::info!(target: "validate", "Validating configuration...");

    let config = AppConfig::from_env()?;

    // Fatal in production, warnings elsewhere.
    config.enforce()?;

    logging::info!(target: "validate", "Configuration validated");

    if args.probe {
        logging::info!(target: "validate", "Probing database connectivity...");

        let state = AppState::new(config, Arc::new(LogMailer));
        state
            .guard
            .wait_for_connection(Duration::from_secs(args.probe_timeout))
            .await?;

        let health = state.health();
        logging::info!(target: "validate",
            state = %health.state,
            healthy = health.healthy,
            "Database probe succeeded"
        );
    }

    Ok(())
}

async fn sweep(args: &SweepArgs) -> Result<()> {
    let config = AppConfig::from_env()?;
    config.enforce()?;

    let state = AppState::new(config, Arc::new(LogMailer));

    match args.interval {
        Some(secs) => {
            logging::info!(target: "sweep", interval_secs = secs, "Starting periodic sweep");
            maintenance::run_periodic_sweep(state, Duration::from_secs(secs)).await;
            Ok(())
        },
        None => {
            let report = maintenance::sweep_expired(&state).await?;
            logging::info!(target: "sweep", removed = report.total(), "Sweep complete");
            Ok(())
        },
    }
}

fn completions(args: &CompletionsArgs) {
    clap_complete::generate(
        args.shell,
        &mut Cli::command(),
        "gatehouse",
        &mut std::io::stdout(),
    );
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_parse_migrate() {
        let cli = Cli::parse_from(["gatehouse", "migrate", "--rollback"]);
        match cli.command {
            Commands::Migrate(args) => assert!(args.rollback),
            _ => panic!("Expected Migrate command"),
        }
    }

    #[test]
    fn test_cli_parse_validate_probe() {
        let cli = Cli::parse_from(["gatehouse", "validate", "--probe", "--probe-timeout", "5"]);
        match cli.command {
            Commands::Validate(args) => {
                assert!(args.probe);
                assert_eq!(args.probe_timeout, 5);
            },
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_cli_parse_sweep_interval() {
        let cli = Cli::parse_from(["gatehouse", "sweep", "--interval", "3600"]);
        match cli.command {
            Commands::Sweep(args) => assert_eq!(args.interval, Some(3600)),
            _ => panic!("Expected Sweep command"),
        }
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["gatehouse", "sweep"]);
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.log_format, "pretty");
    }

    #[test]
    fn test_cli_command_factory() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_name(), "gatehouse");
    }
}
