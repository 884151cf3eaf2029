//! Per-endpoint circuit breaker.
//!
//! ```text
//!            failures >= threshold               reset timeout elapsed
//!  Closed ─────────────────────────▶ Open ───────────────────────────▶ HalfOpen
//!    ▲                                ▲                                  │
//!    │                                └────────── probe failed ──────────┤
//!    └─────────────────────────── probe succeeded ───────────────────────┘
//! ```
//!
//! The Open → HalfOpen transition is lazy: it happens when the first request
//! arrives after the reset timeout, and that request becomes the probe.

use crate::error::{ErrorKind, Result};
use derive_more::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Externally visible breaker state, for diagnostics.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    #[display("closed")]
    Closed,
    #[display("open")]
    Open,
    #[display("half-open")]
    HalfOpen,
}

#[derive(Debug)]
enum State {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    // Only ever locked for a handful of instructions and never across an
    // await, so a blocking mutex is fine (and lets `Permit` settle in `Drop`).
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            state: Mutex::new(State::Closed { failures: 0 }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Nothing can panic while the lock is held; recover regardless.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> CircuitState {
        match *self.lock() {
            State::Closed { .. } => CircuitState::Closed,
            State::Open { since } if since.elapsed() >= self.reset_timeout => CircuitState::HalfOpen,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen => CircuitState::HalfOpen,
        }
    }

    /// Ask for permission to send a request.
    ///
    /// Fails with [`ErrorKind::CircuitOpen`] while the breaker is open, and
    /// while a half-open probe is already in flight. The returned [`Permit`]
    /// must be settled with the request's outcome.
    pub fn try_acquire(self: &Arc<Self>) -> Result<Permit> {
        let mut state = self.lock();
        let probe = match *state {
            State::Closed { .. } => false,
            State::Open { since } if since.elapsed() >= self.reset_timeout => {
                *state = State::HalfOpen;
                tracing::info!(endpoint = %self.name, "Circuit half-open; allowing a probe request");
                true
            },
            State::Open { .. } | State::HalfOpen => {
                tracing::debug!(endpoint = %self.name, "Circuit open; rejecting request");
                exn::bail!(ErrorKind::CircuitOpen(self.name.clone()));
            },
        };
        Ok(Permit {
            breaker: Arc::clone(self),
            probe,
            settled: false,
        })
    }

    fn record_success(&self, probe: bool) {
        let mut state = self.lock();
        match *state {
            State::Closed { ref mut failures } => *failures = 0,
            State::HalfOpen if probe => {
                *state = State::Closed { failures: 0 };
                tracing::info!(endpoint = %self.name, "Probe succeeded; circuit closed");
            },
            // Stragglers sent before the circuit opened don't get a say.
            State::HalfOpen | State::Open { .. } => {},
        }
    }

    fn record_failure(&self, probe: bool) {
        let mut state = self.lock();
        match *state {
            State::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.failure_threshold {
                    *state = State::Open { since: Instant::now() };
                    tracing::warn!(
                        endpoint = %self.name,
                        failures,
                        reset_after = ?self.reset_timeout,
                        "Failure threshold reached; circuit open"
                    );
                } else {
                    *state = State::Closed { failures };
                }
            },
            State::HalfOpen if probe => {
                *state = State::Open { since: Instant::now() };
                tracing::warn!(endpoint = %self.name, "Probe failed; circuit re-opened");
            },
            State::HalfOpen | State::Open { .. } => {},
        }
    }
}

/// Permission to perform one request through a [`CircuitBreaker`].
///
/// Dropping an unsettled probe permit (e.g. the request future was
/// cancelled) counts as a failed probe, otherwise the breaker would stay
/// half-open with nobody probing.
#[must_use = "a permit must be settled with the outcome of the request"]
pub struct Permit {
    breaker: Arc<CircuitBreaker>,
    probe: bool,
    settled: bool,
}
impl Permit {
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success(self.probe);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.probe);
    }
}
impl Drop for Permit {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.record_failure(true);
        }
    }
}
