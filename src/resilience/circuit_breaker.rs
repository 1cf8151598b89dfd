//! Circuit breaker for upstream provider protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: provider assumed down, requests fail fast
//! - Half-Open: trial calls check whether the provider recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open:      in-window failures >= fail_max
//! Open → Half-Open:   on a call attempt, once now - last_failure > reset_timeout
//! Half-Open → Closed: a trial call succeeds (history cleared), or a trial call fails
//!                     while in-window failures stay below fail_max
//! Half-Open → Open:   a trial call fails and in-window failures >= fail_max
//! ```
//!
//! # Design Decisions
//! - Per-provider breaker (not global), see [`super::registry`]
//! - Failures are timestamps in a window, not a consecutive counter, so a
//!   flapping provider trips only when failures cluster
//! - The window is pruned lazily on every call attempt and every recorded
//!   failure; there is no background timer
//! - Half-Open admits every concurrent caller. Concurrent trial successes all
//!   close the breaker, concurrent trial failures all land in the history
//!   and may re-trip it together
//! - A `time_window` of zero prunes every failure immediately, so such a
//!   breaker never trips

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::BreakerSettings;
use crate::observability::metrics;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }

    /// Value exported on the `breaker_state` gauge.
    pub fn gauge_value(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds for a single breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// In-window failures that trip the breaker.
    pub fail_max: u32,
    /// How long an open breaker refuses calls before admitting trial calls.
    pub reset_timeout: Duration,
    /// Age after which a failure no longer counts.
    pub time_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            fail_max: 5,
            reset_timeout: Duration::from_secs(60),
            time_window: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fail_max(mut self, fail_max: u32) -> Self {
        self.fail_max = fail_max;
        self
    }

    pub fn with_reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.reset_timeout = reset_timeout;
        self
    }

    pub fn with_time_window(mut self, time_window: Duration) -> Self {
        self.time_window = time_window;
        self
    }
}

impl From<&BreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        Self {
            fail_max: settings.fail_max,
            reset_timeout: Duration::from_millis(settings.reset_timeout_ms),
            time_window: Duration::from_millis(settings.time_window_ms),
        }
    }
}

/// Returned instead of invoking the operation while the breaker is open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker open for '{dependency}' (retry in {}ms)", retry_after.as_millis())]
pub struct CircuitOpen {
    pub dependency: String,
    /// Time until a trial call will be admitted.
    pub retry_after: Duration,
}

/// Error from a guarded call.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker refused the attempt; the operation never ran.
    #[error(transparent)]
    Open(#[from] CircuitOpen),

    /// The operation ran and failed. The original error is kept as-is.
    #[error("{0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open(_))
    }

    /// The operation's own error, if it ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Inner(e) => Some(e),
            BreakerError::Open(_) => None,
        }
    }
}

/// Point-in-time view of a breaker, for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub dependency: String,
    pub state: CircuitState,
    /// Failures still inside the time window.
    pub failure_count: usize,
    pub fail_max: u32,
    pub reset_timeout_ms: u64,
    pub time_window_ms: u64,
    /// Remaining open time in ms, if currently open and not yet admitting trial calls.
    pub retry_after_ms: Option<u64>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    /// Failure timestamps, oldest first.
    failures: VecDeque<Instant>,
    last_failure: Option<Instant>,
}

/// A thread-safe, time-windowed circuit breaker for one dependency.
///
/// Use [`CircuitBreaker::call`] to run an async operation under protection,
/// or [`CircuitBreaker::acquire`] for a scoped [`Permit`] when the outcome is
/// decided elsewhere.
#[derive(Debug)]
pub struct CircuitBreaker {
    dependency: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(dependency: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let dependency = dependency.into();
        metrics::record_breaker_state(&dependency, CircuitState::Closed);
        Self {
            dependency,
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                last_failure: None,
            }),
        }
    }

    /// Dependency key this breaker protects.
    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Run `operation` under the breaker.
    ///
    /// Fails fast with [`BreakerError::Open`] without calling `operation`
    /// while open. Otherwise the outcome is recorded and an operation error
    /// is handed back unchanged as [`BreakerError::Inner`].
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.acquire()?;
        match operation().await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(e) => {
                permit.failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Ask for the right to attempt one call.
    ///
    /// An open breaker whose `reset_timeout` has elapsed moves to half-open
    /// and admits this caller as a trial call.
    pub fn acquire(&self) -> Result<Permit<'_>, CircuitOpen> {
        let now = Instant::now();
        let mut inner = self.lock();
        self.prune(&mut inner, now);

        if inner.state == CircuitState::Open {
            let elapsed = inner
                .last_failure
                .map(|at| now.duration_since(at))
                .unwrap_or(Duration::MAX);

            if elapsed > self.config.reset_timeout {
                self.transition(&mut inner, CircuitState::HalfOpen);
            } else {
                drop(inner);
                metrics::record_breaker_rejection(&self.dependency);
                return Err(CircuitOpen {
                    dependency: self.dependency.clone(),
                    retry_after: self.config.reset_timeout - elapsed,
                });
            }
        }

        Ok(Permit {
            breaker: self,
            resolved: false,
        })
    }

    /// Record a successful call.
    ///
    /// Closes a half-open breaker and clears its history. While closed the
    /// history is left to the time window.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.failures.clear();
            self.transition(&mut inner, CircuitState::Closed);
        }
    }

    /// Record a failed call and trip the breaker if the window is full.
    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.failures.push_back(now);
        inner.last_failure = Some(now);
        self.prune(&mut inner, now);

        let tripped = inner.failures.len() >= self.config.fail_max as usize;
        match inner.state {
            CircuitState::Closed if tripped => {
                tracing::warn!(
                    dependency = %self.dependency,
                    failures = inner.failures.len(),
                    fail_max = self.config.fail_max,
                    "Circuit breaker tripped"
                );
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::HalfOpen if tripped => {
                tracing::warn!(
                    dependency = %self.dependency,
                    failures = inner.failures.len(),
                    "Trial call failed, circuit breaker re-opened"
                );
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::HalfOpen => {
                self.transition(&mut inner, CircuitState::Closed);
            }
            CircuitState::Closed | CircuitState::Open => {}
        }
    }

    /// Current state. Does not perform the open → half-open check; only a
    /// call attempt does that.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Failures currently inside the time window.
    pub fn failure_count(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        self.prune(&mut inner, now);
        inner.failures.len()
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = Instant::now();
        let mut inner = self.lock();
        self.prune(&mut inner, now);

        let retry_after_ms = match (inner.state, inner.last_failure) {
            (CircuitState::Open, Some(at)) => {
                let elapsed = now.duration_since(at);
                (elapsed <= self.config.reset_timeout)
                    .then(|| (self.config.reset_timeout - elapsed).as_millis() as u64)
            }
            _ => None,
        };

        BreakerSnapshot {
            dependency: self.dependency.clone(),
            state: inner.state,
            failure_count: inner.failures.len(),
            fail_max: self.config.fail_max,
            reset_timeout_ms: self.config.reset_timeout.as_millis() as u64,
            time_window_ms: self.config.time_window.as_millis() as u64,
            retry_after_ms,
        }
    }

    /// Close the breaker and forget all failures.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.failures.clear();
        inner.last_failure = None;
        self.transition(&mut inner, CircuitState::Closed);
    }

    /// Open the breaker now, regardless of history. Trial calls resume after
    /// `reset_timeout`.
    pub fn force_open(&self) {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.last_failure = Some(now);
        self.transition(&mut inner, CircuitState::Open);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // State is valid after any panic point, so a poisoned lock is usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drop failures that have aged out of the window.
    fn prune(&self, inner: &mut Inner, now: Instant) {
        while let Some(&oldest) = inner.failures.front() {
            if now.duration_since(oldest) < self.config.time_window {
                break;
            }
            inner.failures.pop_front();
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        if inner.state == to {
            return;
        }
        let from = inner.state;
        inner.state = to;
        tracing::info!(
            dependency = %self.dependency,
            from = %from,
            to = %to,
            "Circuit breaker state change"
        );
        metrics::record_breaker_transition(&self.dependency, to);
    }
}

/// The right to attempt one call through a breaker.
///
/// Resolve it with [`Permit::success`] or [`Permit::failure`]. A permit
/// dropped unresolved (the caller was cancelled) leaves the breaker as is.
#[must_use = "resolve the permit with success() or failure()"]
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    resolved: bool,
}

impl Permit<'_> {
    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.record_success();
    }

    pub fn failure(mut self) {
        self.resolved = true;
        self.breaker.record_failure();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            tracing::debug!(
                dependency = %self.breaker.dependency,
                "Breaker permit dropped without an outcome"
            );
        }
    }
}
