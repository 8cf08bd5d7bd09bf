//! # Maintenance Sweep
//!
//! Periodic garbage collection of settled credential records: expired or
//! revoked refresh tokens, blacklist rows past their token's natural
//! expiry, and used or expired reset/setup tokens.

use error::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::{password_reset, password_setup, refresh_tokens, AppState};

/// Counts of rows removed by one sweep.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepReport {
    pub refresh_tokens: u64,
    pub blacklist:      u64,
    pub reset_tokens:   u64,
    pub setup_tokens:   u64,
}

impl SweepReport {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.refresh_tokens + self.blacklist + self.reset_tokens + self.setup_tokens
    }
}

/// Runs one sweep over all four tables.
///
/// # Errors
///
/// Returns an error when the store is unavailable or a delete fails.
pub async fn sweep_expired(state: &AppState) -> Result<SweepReport> {
    let db = state.guard.acquire().await?;

    let report = SweepReport {
        refresh_tokens: refresh_tokens::purge_settled(&db).await?,
        blacklist:      state.blacklist.prune_expired(&db).await?,
        reset_tokens:   password_reset::purge_settled(&db).await?,
        setup_tokens:   password_setup::purge_settled(&db).await?,
    };

    if report.total() > 0 {
        info!(
            refresh_tokens = report.refresh_tokens,
            blacklist = report.blacklist,
            reset_tokens = report.reset_tokens,
            setup_tokens = report.setup_tokens,
            "Swept settled credential records"
        );
    }

    Ok(report)
}

/// Runs the sweep on a fixed interval until the task is dropped. Errors
/// are logged and the loop keeps going; an unavailable store just means
/// the next tick retries.
pub async fn run_periodic_sweep(state: AppState, every: std::time::Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if let Err(e) = sweep_expired(&state).await {
            warn!(error = %e, "Maintenance sweep failed; will retry next interval");
        }
    }
}
