//! Circuit breaker pattern implementation for the Vertex AI client.
//!
//! Stops calling a failing endpoint once consecutive failures reach a
//! threshold and lets a single trial call through after a recovery timeout.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Default number of consecutive failures that opens the circuit.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time the circuit stays open before a trial call is allowed.
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for the circuit breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time since the last failure after which an open circuit admits a trial call.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a new circuit breaker configuration.
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
        }
    }

    /// Creates a sensitive configuration that opens quickly.
    pub fn sensitive() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
        }
    }

    /// Creates a lenient configuration that tolerates more failures.
    pub fn lenient() -> Self {
        Self {
            failure_threshold: 10,
            recovery_timeout: Duration::from_secs(120),
        }
    }
}

/// The state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected until the recovery timeout has elapsed.
    Open,
    /// A single trial call decides whether to close or reopen.
    HalfOpen,
}

impl CircuitState {
    /// Lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hook for circuit breaker state changes.
pub trait CircuitBreakerHook: Send + Sync {
    /// Called after the circuit moved from `from` to `to`.
    fn on_state_change(&self, from: CircuitState, to: CircuitState);
}

/// Outcome of [`CircuitBreaker::call`] when the call did not succeed.
#[derive(Debug, Clone, PartialEq)]
pub enum CallError<E> {
    /// The breaker refused the call without running it.
    ///
    /// `retry_after` is the time left until a trial call is admitted, or
    /// `None` while another caller's trial call is in flight.
    Rejected { retry_after: Option<Duration> },
    /// The call ran and failed.
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Rejected { .. } => f.write_str("circuit breaker is open"),
            CallError::Failed(err) => err.fmt(f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CallError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CallError::Rejected { .. } => None,
            CallError::Failed(err) => Some(err),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
    /// Bumped on every state change. Outcomes of calls admitted under an
    /// older generation are ignored.
    generation: u64,
}

impl BreakerState {
    fn transition(&mut self, to: CircuitState) -> (CircuitState, CircuitState) {
        let from = self.state;
        self.state = to;
        self.generation = self.generation.wrapping_add(1);
        self.trial_in_flight = false;
        (from, to)
    }

    /// Applies the bookkeeping of an admitted call's outcome. Returns false
    /// when the call was admitted before the last state change.
    fn settle(&mut self, admission: Option<Admission>) -> bool {
        match admission {
            Some(admission) if admission.generation != self.generation => false,
            Some(admission) => {
                if admission.trial {
                    self.trial_in_flight = false;
                }
                true
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Admission {
    generation: u64,
    trial: bool,
}

/// Circuit breaker guarding calls to a remote endpoint.
///
/// All state lives behind one mutex, so concurrent callers observe and
/// apply transitions one at a time and at most one half-open trial call
/// runs at once.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    hook: Option<Arc<dyn CircuitBreakerHook>>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker with the given configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                trial_in_flight: false,
                generation: 0,
            }),
            hook: None,
        }
    }

    /// Creates a circuit breaker with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Sets a state change hook.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn CircuitBreakerHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Runs `operation` if the circuit admits it and records the outcome.
    ///
    /// An open circuit whose recovery timeout has elapsed moves to
    /// half-open and lets this call through as the trial.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self
            .acquire()
            .map_err(|retry_after| CallError::Rejected { retry_after })?;

        match operation().await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(err) => {
                permit.fail();
                Err(CallError::Failed(err))
            }
        }
    }

    fn acquire(&self) -> Result<Permit<'_>, Option<Duration>> {
        let mut transition = None;

        let admitted = {
            let mut inner = self.inner.lock();
            let state = inner.state;
            let trial = match state {
                CircuitState::Closed => Ok(false),
                CircuitState::Open => {
                    let elapsed = inner
                        .last_failure
                        .map_or(self.config.recovery_timeout, |at| at.elapsed());

                    if elapsed >= self.config.recovery_timeout {
                        transition = Some(inner.transition(CircuitState::HalfOpen));
                        inner.trial_in_flight = true;
                        Ok(true)
                    } else {
                        Err(Some(self.config.recovery_timeout - elapsed))
                    }
                }
                CircuitState::HalfOpen if inner.trial_in_flight => Err(None),
                CircuitState::HalfOpen => {
                    inner.trial_in_flight = true;
                    Ok(true)
                }
            };
            trial.map(|trial| Admission {
                generation: inner.generation,
                trial,
            })
        };

        if let Some((from, to)) = transition {
            tracing::info!("Circuit breaker transitioning to HALF-OPEN state");
            self.notify(from, to);
        }

        admitted.map(|admission| Permit {
            breaker: self,
            admission,
            settled: false,
        })
    }

    /// Records a successful call against the current state.
    pub fn record_success(&self) {
        self.on_success(None);
    }

    /// Records a failed call against the current state.
    pub fn record_failure(&self) {
        self.on_failure(None);
    }

    fn on_success(&self, admission: Option<Admission>) {
        let transition = {
            let mut inner = self.inner.lock();
            if !inner.settle(admission) {
                drop(inner);
                tracing::debug!("Ignoring success of a call admitted before the last state change");
                return;
            }

            inner.failure_count = 0;
            let state = inner.state;
            match state {
                CircuitState::Closed => None,
                _ => Some(inner.transition(CircuitState::Closed)),
            }
        };

        if let Some((from, to)) = transition {
            tracing::info!("Circuit breaker transitioning to CLOSED state");
            self.notify(from, to);
        }
    }

    fn on_failure(&self, admission: Option<Admission>) {
        let (from, transition, failures) = {
            let mut inner = self.inner.lock();
            if !inner.settle(admission) {
                drop(inner);
                tracing::debug!("Ignoring failure of a call admitted before the last state change");
                return;
            }

            inner.failure_count = inner.failure_count.saturating_add(1);
            inner.last_failure = Some(Instant::now());

            let from = inner.state;
            let opens = match from {
                CircuitState::Closed => inner.failure_count >= self.config.failure_threshold,
                CircuitState::HalfOpen => true,
                CircuitState::Open => false,
            };

            let transition = opens.then(|| inner.transition(CircuitState::Open));
            (from, transition, inner.failure_count)
        };

        match transition {
            Some((from, to)) => {
                tracing::error!(
                    failures,
                    recovery_timeout = ?self.config.recovery_timeout,
                    "Circuit breaker opened after {} failures",
                    failures
                );
                self.notify(from, to);
            }
            None if from == CircuitState::Open => {
                tracing::debug!("Circuit breaker recorded failure while open");
            }
            None => {
                tracing::warn!(
                    "Circuit breaker recorded failure ({}/{})",
                    failures,
                    self.config.failure_threshold
                );
            }
        }
    }

    fn release_trial(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation {
            inner.trial_in_flight = false;
        }
    }

    fn notify(&self, from: CircuitState, to: CircuitState) {
        if let Some(hook) = &self.hook {
            hook.on_state_change(from, to);
        }
    }

    /// Returns the current state of the circuit.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Returns the current consecutive failure count.
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Returns when the last failure was recorded.
    pub fn last_failure(&self) -> Option<Instant> {
        self.inner.lock().last_failure
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Resets the circuit breaker to closed state.
    pub fn reset(&self) {
        let (from, _) = {
            let mut inner = self.inner.lock();
            inner.failure_count = 0;
            inner.last_failure = None;
            inner.transition(CircuitState::Closed)
        };

        if from != CircuitState::Closed {
            tracing::info!("Circuit breaker reset to CLOSED state");
            self.notify(from, CircuitState::Closed);
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .finish()
    }
}

/// Admission to run one call. A trial permit dropped before its outcome is
/// recorded (the caller's future was cancelled) frees the trial slot.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    settled: bool,
}

impl Permit<'_> {
    fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(Some(self.admission));
    }

    fn fail(mut self) {
        self.settled = true;
        self.breaker.on_failure(Some(self.admission));
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.admission.trial && !self.settled {
            self.breaker.release_trial(self.admission.generation);
        }
    }
}
