//! Shared test fixtures: in-memory SQLite state with migrations applied.

use std::sync::Arc;

use auth::{secrecy::SecretString, ClientContext, TokenCodecConfig};
use migration::{Migrator, MigratorTrait};
use server::{
    config::{AppConfig, BreakerSettings, DatabaseSettings, Environment, RecoverySettings},
    mailer::LogMailer,
    AppState,
};

pub const ACCESS_SECRET: &str = "kXp9#mQ2$vLs8@jR4!nWc6%bTy1&zHd3*fGa5^eU";
pub const REFRESH_SECRET: &str = "Wm3@qZx7!pKv1$tYb9%rNf5^cJh2&dLg8*sEa4#u";

/// Configuration pointing at the given database URL.
pub fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        environment:  Environment::Development,
        database:     DatabaseSettings {
            host:     "localhost".to_string(),
            port:     5432,
            name:     "gatehouse".to_string(),
            user:     "gatehouse".to_string(),
            password: String::new(),
            ssl_mode: "prefer".to_string(),
            // A second pooled connection to sqlite::memory: would see its
            // own empty database.
            pool_size: 1,
            connect_timeout_secs: 2,
            url_override: Some(database_url.to_string()),
        },
        tokens:       TokenCodecConfig::new(
            SecretString::from(ACCESS_SECRET.to_string()),
            Some(SecretString::from(REFRESH_SECRET.to_string())),
        ),
        breaker:      BreakerSettings {
            failure_threshold: 5,
            cooldown_secs:     30,
        },
        recovery:     RecoverySettings {
            reset_max_requests:   3,
            reset_window_secs:    3600,
            reset_token_ttl_secs: 900,
            setup_max_requests:   5,
            setup_window_secs:    86400,
            setup_token_ttl_secs: 86400,
        },
        admin_emails: vec!["root@gatehouse.test".to_string()],
        frontend_url: "https://app.gatehouse.test".to_string(),
    }
}

/// Fresh state over an in-memory SQLite database with migrations applied.
pub async fn setup_state() -> AppState {
    let state = AppState::new(test_config("sqlite::memory:"), Arc::new(LogMailer));

    let db = state.guard.acquire().await.expect("test database should connect");
    Migrator::up(&db, None).await.expect("migrations should apply");

    state
}

/// State whose database can never be reached.
pub fn unreachable_state() -> AppState {
    AppState::new(
        test_config("sqlite:///nonexistent-gatehouse-dir/gatehouse.db?mode=ro"),
        Arc::new(LogMailer),
    )
}

/// A stable client context standing in for one device.
pub fn device_a() -> ClientContext { ClientContext::new("203.0.113.7", "Mozilla/5.0 (test)") }

/// A second device for the same user.
pub fn device_b() -> ClientContext { ClientContext::new("198.51.100.23", "curl/8.5") }
