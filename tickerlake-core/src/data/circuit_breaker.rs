//! Circuit breaker for provider rate limiting and IP bans.
//!
//! HTTP 403 trips the breaker immediately; repeated 429/5xx responses trip it
//! once `failure_threshold` consecutive failures are recorded. While open, the
//! provider refuses requests until `cooldown` has elapsed.
//!
//! Ingestion is single-threaded, so state lives in `Cell`s.

use std::cell::Cell;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open { tripped_at: Instant },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: Cell<BreakerState>,
    consecutive_failures: Cell<u32>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: Cell::new(BreakerState::Closed),
            consecutive_failures: Cell::new(0),
            failure_threshold: failure_threshold.max(1),
            cooldown,
        }
    }

    /// Whether requests are allowed. Closes the breaker once the cooldown expires.
    pub fn is_allowed(&self) -> bool {
        match self.state.get() {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } if tripped_at.elapsed() >= self.cooldown => {
                self.state.set(BreakerState::Closed);
                self.consecutive_failures.set(0);
                true
            }
            BreakerState::Open { .. } => false,
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.set(0);
    }

    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.get() + 1;
        self.consecutive_failures.set(failures);
        if failures >= self.failure_threshold {
            self.trip();
        }
    }

    /// Open the breaker now (403 Forbidden).
    pub fn trip(&self) {
        self.state.set(BreakerState::Open {
            tripped_at: Instant::now(),
        });
    }

    /// Remaining cooldown (zero when closed).
    pub fn remaining_cooldown(&self) -> Duration {
        match self.state.get() {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => self.cooldown.saturating_sub(tripped_at.elapsed()),
        }
    }
}

impl Default for CircuitBreaker {
    /// Three strikes, thirty-minute cooldown.
    fn default() -> Self {
        Self::new(3, Duration::from_secs(30 * 60))
    }
}
