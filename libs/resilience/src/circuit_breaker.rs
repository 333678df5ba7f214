/// Circuit Breaker protecting the ranking path
///
/// State transitions:
/// - Closed → Open: when consecutive failures reach the threshold
/// - Open → HalfOpen: after the recovery timeout, the next call is let through
/// - HalfOpen → Closed: on a successful call
/// - HalfOpen → Open: on a failed call
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls pass through
    Closed,
    /// Circuit is open, calls fail fast
    Open,
    /// Testing recovery, a single probe call is allowed
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failure count that opens the circuit
    pub failure_threshold: u32,
    /// Duration to wait before letting a probe call through
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError {
    #[error("circuit breaker '{0}' is open - failing fast")]
    Open(String),
    #[error("call failed: {0}")]
    CallFailed(String),
}

struct BreakerState {
    current: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Arc<Mutex<BreakerState>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Arc::new(Mutex::new(BreakerState {
                current: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
            })),
        }
    }

    /// Execute a call through the breaker.
    ///
    /// Returns `CircuitBreakerError::Open` when short-circuiting and
    /// `CallFailed` when the call itself errored (the failure is recorded).
    /// The call runs outside the state lock.
    pub fn call<T, E, F>(&self, primary: F) -> Result<T, CircuitBreakerError>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::fmt::Display,
    {
        if !self.admit() {
            return Err(CircuitBreakerError::Open(self.name.clone()));
        }

        match primary() {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(CircuitBreakerError::CallFailed(e.to_string()))
            }
        }
    }

    /// Execute a call through the breaker, substituting `fallback` both when
    /// the circuit is open and when the call fails. A failed call still
    /// counts toward opening the circuit.
    pub fn call_or<T, E, F, FB>(&self, primary: F, fallback: FB) -> T
    where
        F: FnOnce() -> Result<T, E>,
        FB: FnOnce() -> T,
        E: std::fmt::Display,
    {
        if !self.admit() {
            warn!("circuit breaker '{}' open, serving fallback", self.name);
            return fallback();
        }

        match primary() {
            Ok(value) => {
                self.on_success();
                value
            }
            Err(e) => {
                self.on_failure();
                warn!(
                    error = %e,
                    "circuit breaker '{}' caught error, serving fallback", self.name
                );
                fallback()
            }
        }
    }

    /// Whether a call may proceed. Transitions Open → HalfOpen once the
    /// recovery timeout has elapsed.
    fn admit(&self) -> bool {
        let mut state = self.state.lock();
        match state.current {
            CircuitState::Open => {
                let recovered = state
                    .last_failure_time
                    .map(|t| t.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if recovered {
                    info!("circuit breaker '{}' entering half-open", self.name);
                    state.current = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            CircuitState::Closed | CircuitState::HalfOpen => true,
        }
    }

    fn on_success(&self) {
        let mut state = self.state.lock();
        state.failure_count = 0;
        if state.current == CircuitState::HalfOpen {
            info!("circuit breaker '{}' recovered to closed", self.name);
            state.current = CircuitState::Closed;
        }
    }

    fn on_failure(&self) {
        let mut state = self.state.lock();
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());

        match state.current {
            CircuitState::HalfOpen => {
                warn!("circuit breaker '{}' reopened from half-open", self.name);
                state.current = CircuitState::Open;
            }
            CircuitState::Closed => {
                if state.failure_count >= self.config.failure_threshold {
                    warn!(
                        "circuit breaker '{}' opened after {} failures",
                        self.name, state.failure_count
                    );
                    state.current = CircuitState::Open;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state.lock().current
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Manually force the breaker back to closed.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.current = CircuitState::Closed;
        state.failure_count = 0;
        state.last_failure_time = None;
        info!("circuit breaker '{}' manually reset", self.name);
    }
}
