//! # Connection Guard
//!
//! Owns the lifecycle of the database connection pool and wraps every
//! connection attempt in a three-state circuit breaker, so the rest of the
//! system fails fast against a dead store instead of queuing behind
//! multi-second timeouts.
//!
//! The breaker itself is a pure state machine ([`Breaker`]) driven by
//! explicit instants; [`ConnectionGuard`] adds the IO. The breaker mutex is
//! never held across an `await`.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use error::{AppError, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Consecutive failures that trip the breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// How long the breaker stays open before allowing a probe.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

/// Per-attempt connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Backoff parameters for [`ConnectionGuard::wait_for_connection`].
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Normal operation; attempts allowed.
    Closed,
    /// Too many recent failures; attempts short-circuited until cooldown.
    Open,
    /// Cooldown elapsed; one probe attempt in flight decides the next state.
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "closed"),
            BreakerState::Open => write!(f, "open"),
            BreakerState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Guard configuration.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub failure_threshold: u32,
    pub cooldown:          Duration,
    pub connect_timeout:   Duration,
    pub pool_size:         u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown:          DEFAULT_COOLDOWN,
            connect_timeout:   DEFAULT_CONNECT_TIMEOUT,
            pool_size:         10,
        }
    }
}

/// Outcome of asking the breaker whether an attempt may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Attempt allowed. `probe` marks the single HalfOpen probe.
    Allow {
        probe: bool,
    },
    /// Short-circuited without touching the store.
    Reject {
        retry_after: Duration,
    },
}

/// Pure breaker state machine. All transitions take an explicit `now` so
/// they can be driven deterministically in tests.
#[derive(Debug)]
pub struct Breaker {
    failure_threshold: u32,
    cooldown:          Duration,
    state:             BreakerState,
    failure_count:     u32,
    next_attempt_at:   Option<Instant>,
    probe_started_at:  Option<Instant>,
    last_failure_at:   Option<DateTime<Utc>>,
    last_success_at:   Option<DateTime<Utc>>,
}

impl Breaker {
    #[must_use]
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold,
            cooldown,
            state: BreakerState::Closed,
            failure_count: 0,
            next_attempt_at: None,
            probe_started_at: None,
            last_failure_at: None,
            last_success_at: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> BreakerState { self.state }

    #[must_use]
    pub fn failure_count(&self) -> u32 { self.failure_count }

    /// Decides whether an attempt at `now` may proceed, transitioning
    /// Open -> HalfOpen when the cooldown has elapsed.
    pub fn decide(&mut self, now: Instant) -> Decision {
        match self.state {
            BreakerState::Closed => {
                Decision::Allow {
                    probe: false,
                }
            },
            BreakerState::Open => {
                match self.next_attempt_at {
                    Some(at) if now < at => {
                        Decision::Reject {
                            retry_after: at - now,
                        }
                    },
                    _ => {
                        self.state = BreakerState::HalfOpen;
                        self.probe_started_at = Some(now);
                        Decision::Allow {
                            probe: true,
                        }
                    },
                }
            },
            BreakerState::HalfOpen => {
                // A probe that never reported back (cancelled future) must
                // not wedge the breaker: after one cooldown the next caller
                // takes the probe over.
                let stale = self
                    .probe_started_at
                    .map(|t| now.duration_since(t) >= self.cooldown)
                    .unwrap_or(true);

                if stale {
                    self.probe_started_at = Some(now);
                    Decision::Allow {
                        probe: true,
                    }
                }
                else {
                    Decision::Reject {
                        retry_after: self.cooldown,
                    }
                }
            },
        }
    }

    /// Records a successful attempt: counter reset, state forced Closed.
    pub fn record_success(&mut self, _now: Instant) {
        self.state = BreakerState::Closed;
        self.failure_count = 0;
        self.next_attempt_at = None;
        self.probe_started_at = None;
        self.last_success_at = Some(Utc::now());
    }

    /// Records a failed attempt. A failed HalfOpen probe reopens the
    /// breaker with a fresh cooldown; in Closed, reaching the threshold
    /// opens it.
    pub fn record_failure(&mut self, now: Instant) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_at = Some(Utc::now());

        let opened = match self.state {
            BreakerState::HalfOpen => true,
            BreakerState::Closed => self.failure_count >= self.failure_threshold,
            BreakerState::Open => true,
        };

        if opened {
            self.state = BreakerState::Open;
            self.next_attempt_at = Some(now + self.cooldown);
            self.probe_started_at = None;
        }
    }

    fn retry_in(&self, now: Instant) -> Option<Duration> {
        match self.state {
            BreakerState::Open => self.next_attempt_at.map(|at| at.saturating_duration_since(now)),
            _ => None,
        }
    }
}

/// Read-only health snapshot for external readiness checks.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub state:           BreakerState,
    pub failure_count:   u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    /// Seconds until the next attempt is allowed, when Open.
    pub retry_in_secs:   Option<u64>,
    pub healthy:         bool,
}

enum AcquireError {
    /// Breaker is open; no connection attempt was made.
    Open {
        retry_after: Duration,
    },
    /// A real connection attempt (or liveness check) failed.
    Connect,
}

struct GuardInner {
    breaker: Breaker,
    pool:    Option<DatabaseConnection>,
}

/// The sole gateway to the credential store.
#[derive(Clone)]
pub struct ConnectionGuard {
    database_url:    String,
    connect_timeout: Duration,
    pool_size:       u32,
    inner:           Arc<Mutex<GuardInner>>,
}

impl ConnectionGuard {
    #[must_use]
    pub fn new(database_url: impl Into<String>, config: GuardConfig) -> Self {
        Self {
            database_url:    database_url.into(),
            connect_timeout: config.connect_timeout,
            pool_size:       config.pool_size,
            inner:           Arc::new(Mutex::new(GuardInner {
                breaker: Breaker::new(config.failure_threshold, config.cooldown),
                pool:    None,
            })),
        }
    }

    /// Returns a live pool handle, or fails immediately with
    /// [`AppError::Unavailable`] when the breaker is open.
    pub async fn acquire(&self) -> Result<DatabaseConnection> {
        match self.try_acquire().await {
            Ok(db) => Ok(db),
            Err(AcquireError::Open { retry_after }) => {
                let secs = retry_after.as_secs().max(1);
                debug!(retry_in_secs = secs, "Database attempt short-circuited by open breaker");
                Err(AppError::unavailable(
                    "Database temporarily unavailable (circuit breaker open)",
                    secs,
                ))
            },
            Err(AcquireError::Connect) => Err(AppError::unavailable("Database connection failed", 1)),
        }
    }

    /// Blocking variant that retries with exponential backoff (1 s start,
    /// factor 2, capped at 5 s) until `max_wait` elapses.
    ///
    /// Still honors the breaker: once it opens, this fails fast with a
    /// descriptive error rather than retrying into a known-dead store.
    pub async fn wait_for_connection(&self, max_wait: Duration) -> Result<DatabaseConnection> {
        let started = Instant::now();
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match self.try_acquire().await {
                Ok(db) => return Ok(db),
                Err(AcquireError::Open { retry_after }) => {
                    let secs = retry_after.as_secs().max(1);
                    return Err(AppError::unavailable(
                        format!(
                            "Gave up waiting for the database: circuit breaker is open, next attempt allowed in {}s",
                            secs
                        ),
                        secs,
                    ));
                },
                Err(AcquireError::Connect) => {
                    if started.elapsed() + backoff > max_wait {
                        return Err(AppError::unavailable(
                            format!(
                                "Timed out waiting for a database connection after {}s",
                                started.elapsed().as_secs()
                            ),
                            backoff.as_secs().max(1),
                        ));
                    }

                    debug!(
                        delay_ms = backoff.as_millis() as u64,
                        "Retrying database connection after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                },
            }
        }
    }

    /// Read-only health snapshot.
    #[must_use]
    pub fn health(&self) -> HealthSnapshot {
        let inner = self.lock();
        let now = Instant::now();

        HealthSnapshot {
            state:           inner.breaker.state(),
            failure_count:   inner.breaker.failure_count(),
            last_failure_at: inner.breaker.last_failure_at,
            last_success_at: inner.breaker.last_success_at,
            retry_in_secs:   inner.breaker.retry_in(now).map(|d| d.as_secs()),
            healthy:         inner.breaker.state() == BreakerState::Closed && inner.pool.is_some(),
        }
    }

    async fn try_acquire(&self) -> Result<DatabaseConnection, AcquireError> {
        let (decision, cached) = {
            let mut inner = self.lock();
            let decision = inner.breaker.decide(Instant::now());
            (decision, inner.pool.clone())
        };

        let probe = match decision {
            Decision::Reject { retry_after } => {
                return Err(AcquireError::Open {
                    retry_after,
                })
            },
            Decision::Allow { probe } => probe,
        };

        // Reuse the cached pool when it is still alive; a dead pool counts
        // as a breaker failure like any other failed attempt.
        if let Some(pool) = cached {
            return match pool.ping().await {
                Ok(()) => {
                    self.on_success(&pool, probe);
                    Ok(pool)
                },
                Err(e) => {
                    warn!(error = %e, "Cached database pool failed liveness check");
                    self.on_failure(true);
                    Err(AcquireError::Connect)
                },
            };
        }

        let mut options = ConnectOptions::new(self.database_url.clone());
        options
            .connect_timeout(self.connect_timeout)
            .max_connections(self.pool_size)
            .sqlx_logging(false);

        match Database::connect(options).await {
            Ok(pool) => {
                self.on_success(&pool, probe);
                Ok(pool)
            },
            Err(e) => {
                warn!(error = %e, "Database connection attempt failed");
                self.on_failure(false);
                Err(AcquireError::Connect)
            },
        }
    }

    fn on_success(&self, pool: &DatabaseConnection, probe: bool) {
        let mut inner = self.lock();
        let was = inner.breaker.state();
        inner.breaker.record_success(Instant::now());
        inner.pool = Some(pool.clone());

        if probe || was != BreakerState::Closed {
            info!(previous_state = %was, "Database connection restored; breaker closed");
        }
    }

    fn on_failure(&self, drop_pool: bool) {
        let mut inner = self.lock();
        inner.breaker.record_failure(Instant::now());
        if drop_pool {
            inner.pool = None;
        }

        if inner.breaker.state() == BreakerState::Open {
            warn!(
                failure_count = inner.breaker.failure_count(),
                "Database circuit breaker opened"
            );
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GuardInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("state", &self.lock().breaker.state())
            .finish_non_exhaustive()
    }
}
