//! Circuit breaker guarding the networked backend.
//!
//! Three states:
//! - `Closed`: every call is admitted. Failures raise the failure count, successes
//!   lower it (floor 0). Reaching the failure threshold opens the breaker.
//! - `Open`: calls are rejected until `next_attempt`; the first admission check at
//!   or after that instant moves to `HalfOpen` with a zeroed count.
//! - `HalfOpen`: calls are admitted as trials. Each success lowers the count; at
//!   `-success_threshold` the breaker closes. Failures raise the count with the
//!   same threshold rule as `Closed`.
//!
//! State lives behind a `std::sync::Mutex` that is never held across an await.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 10;
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 3;
pub const DEFAULT_BREAKER_TIMEOUT_MS: u64 = 60_000;

/// Thresholds and open duration for a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            timeout: Duration::from_millis(DEFAULT_BREAKER_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Read-only view of the breaker for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failure_count: i64,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout_ms: u64,
    /// Set while the breaker is open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attempt: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: i64,
    next_attempt: Instant,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                next_attempt: Instant::now(),
            }),
        }
    }

    /// Admission check. May move `Open` to `HalfOpen` once the timeout elapsed.
    pub fn check(&self) -> bool {
        self.check_at(Instant::now())
    }

    pub(crate) fn check_at(&self, now: Instant) -> bool {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open if now >= inner.next_attempt => {
                inner.state = BreakerState::HalfOpen;
                inner.failure_count = 0;
                info!("Circuit breaker half-open, admitting trial requests");
                true
            }
            BreakerState::Open => false,
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.failure_count -= 1;
                if inner.failure_count <= -i64::from(self.config.success_threshold) {
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    info!("Circuit breaker closed");
                }
            }
            BreakerState::Closed | BreakerState::Open => {
                inner.failure_count = (inner.failure_count - 1).max(0);
            }
        }
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    pub(crate) fn record_failure_at(&self, now: Instant) {
        let mut inner = self.lock();
        inner.failure_count += 1;
        if inner.failure_count >= i64::from(self.config.failure_threshold) {
            if inner.state != BreakerState::Open {
                warn!(
                    failure_count = inner.failure_count,
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Circuit breaker opened"
                );
            }
            inner.state = BreakerState::Open;
            inner.next_attempt = now + self.config.timeout;
        }
    }

    /// Zero the failure count without changing state.
    pub fn reset_failures(&self) {
        self.lock().failure_count = 0;
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn failure_count(&self) -> i64 {
        self.lock().failure_count
    }

    /// Time left before an open breaker admits a trial; zero otherwise.
    pub fn retry_after(&self) -> Duration {
        let inner = self.lock();
        match inner.state {
            BreakerState::Open => inner.next_attempt.saturating_duration_since(Instant::now()),
            _ => Duration::ZERO,
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        let next_attempt = if inner.state == BreakerState::Open {
            let remaining = inner.next_attempt.saturating_duration_since(Instant::now());
            chrono::Duration::from_std(remaining)
                .ok()
                .map(|d| Utc::now() + d)
        } else {
            None
        };

        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            failure_threshold: self.config.failure_threshold,
            success_threshold: self.config.success_threshold,
            timeout_ms: self.config.timeout.as_millis() as u64,
            next_attempt,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // Counters stay consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
