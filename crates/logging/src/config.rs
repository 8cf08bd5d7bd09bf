//! # Logging Configuration
//!
//! Environment- and flag-driven configuration for the logging subsystem.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, Registry};

/// Logging configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,

    /// Output format (json, pretty, compact)
    pub format: String,

    /// Optional log file path
    pub log_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level:    "info".to_string(),
            format:   "json".to_string(),
            log_file: None,
        }
    }
}

impl LoggingConfig {
    /// Create configuration from environment variables, falling back to the
    /// provided flag values.
    pub fn from_env(level: &str, format: &str, log_file: Option<&str>) -> Self {
        Self {
            level:    std::env::var("RUST_LOG").ok().unwrap_or_else(|| level.to_string()),
            format:   std::env::var("GATEHOUSE_LOG_FORMAT")
                .ok()
                .unwrap_or_else(|| format.to_string()),
            log_file: std::env::var("GATEHOUSE_LOG_FILE")
                .ok()
                .or_else(|| log_file.map(|s| s.to_string())),
        }
    }

    /// Build the tracing subscriber from this configuration.
    pub fn build(&self) -> Box<dyn tracing::Subscriber + Send + Sync> {
        let level: LevelFilter = self.level.parse().unwrap_or(LevelFilter::INFO);

        // Construct the optional JSON file layer. This is inlined per match
        // branch below because each branch produces a distinct subscriber stack,
        // and the file layer's generic subscriber parameter must unify with that
        // branch's stack independently.
        macro_rules! file_layer {
            () => {
                self.log_file.as_ref().map(|log_file| {
                    let path = Path::new(log_file);
                    let dir = path.parent().unwrap_or_else(|| Path::new("."));
                    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
                    let appender = tracing_appender::rolling::daily(
                        dir,
                        file_name.unwrap_or_else(|| "gatehouse.log".into()),
                    );
                    fmt::layer().json().with_writer(appender)
                })
            };
        }

        match self.format.as_str() {
            "pretty" => Box::new(
                Registry::default()
                    .with(level)
                    .with(fmt::layer().pretty())
                    .with(file_layer!()),
            ),
            "compact" => Box::new(
                Registry::default()
                    .with(level)
                    .with(fmt::layer().compact())
                    .with(file_layer!()),
            ),
            // JSON is the production default; unknown formats fall back to it.
            _ => Box::new(
                Registry::default()
                    .with(level)
                    .with(fmt::layer().json())
                    .with(file_layer!()),
            ),
        }
    }
}
