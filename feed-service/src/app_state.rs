//! Shared application state
//!
//! Wires the repositories, feature flags, ranking engine and circuit breaker
//! into one graph. Construction is idempotent: building a fresh state (as
//! every test does) is the reset hook for the process-wide pieces.

use std::sync::Arc;
use std::time::Duration;

use resilience::{CircuitBreaker, CircuitBreakerConfig};

use crate::config::Settings;
use crate::repositories::{
    InMemoryCandidateRepository, InMemoryTenantConfigRepository, InMemoryUserSignalRepository,
};
use crate::services::{FeatureFlags, FeedService, RankingEngine};

#[derive(Clone)]
pub struct AppState {
    pub feed_service: Arc<FeedService>,
    pub circuit_breaker: Arc<CircuitBreaker>,
}

impl AppState {
    /// Default wiring over the in-memory repositories.
    pub fn new() -> Self {
        Self::with_settings(&Settings::current())
    }

    pub fn with_settings(settings: &Settings) -> Self {
        let circuit_breaker = Arc::new(CircuitBreaker::new(
            "ranking_engine",
            CircuitBreakerConfig {
                failure_threshold: settings.circuit_breaker_failure_threshold,
                recovery_timeout: Duration::from_secs(
                    settings.circuit_breaker_recovery_timeout_sec,
                ),
            },
        ));

        let feed_service = Arc::new(FeedService::new(
            Arc::new(InMemoryUserSignalRepository::new()),
            Arc::new(InMemoryCandidateRepository::new()),
            Arc::new(InMemoryTenantConfigRepository::new()),
            Arc::new(FeatureFlags::new(100.0)),
            RankingEngine::new(),
            circuit_breaker.clone(),
        ));

        Self {
            feed_service,
            circuit_breaker,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
