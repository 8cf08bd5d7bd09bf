//! # Gatehouse Logging Infrastructure
//!
//! Structured logging for the Gatehouse platform core. Wraps
//! tracing-subscriber with JSON output for production and pretty/compact
//! formats for development, configured from CLI flags or environment.

pub mod config;

pub use config::LoggingConfig;
// Re-export tracing macros so callers depend on one crate.
pub use tracing::{debug, error, info, trace, warn};

/// Initialize the logging system.
///
/// # Arguments
///
/// * `level` - Log level (debug, info, warn, error)
/// * `format` - Output format (json, pretty, compact)
/// * `log_file` - Optional path to a log file
pub fn init(level: &str, format: &str, log_file: Option<&str>) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    init_with_config(LoggingConfig::from_env(level, format, log_file))
}

/// Initialize logging with an explicit configuration.
pub fn init_with_config(config: LoggingConfig) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let subscriber = config.build();
    tracing::subscriber::set_global_default(subscriber)?;
    info!(level = %config.level, format = %config.format, "Logging initialized");
    Ok(())
}
