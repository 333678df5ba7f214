/// Configuration for the feed service
///
/// All values come from environment variables (with `.env` support); nothing
/// is hardcoded at call sites. The active settings live in a process-wide
/// cell so feature flags and limits can be changed at runtime without a
/// restart. Hot-path readers take the `Arc` and never hold the lock.
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

static SETTINGS: Lazy<RwLock<Arc<Settings>>> =
    Lazy::new(|| RwLock::new(Arc::new(Settings::from_env())));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind host
    pub host: String,
    /// Server bind port
    pub port: u16,

    /// Master enable for personalized ranking
    pub personalization_enabled: bool,
    /// Forces the fallback feed everywhere, overriding everything else
    pub kill_switch_active: bool,
    /// Percentage of users receiving the personalized feed (0-100)
    pub rollout_percentage: u32,

    /// Page size when the request omits `limit`
    pub default_feed_limit: usize,
    /// Hard cap on the requested page size
    pub max_feed_limit: usize,

    // Per-dependency latency budgets (milliseconds)
    pub ranking_timeout_ms: u64,
    pub cache_timeout_ms: u64,
    pub signal_store_timeout_ms: u64,

    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_recovery_timeout_sec: u64,

    // Cache TTLs (seconds)
    pub tenant_config_ttl_sec: u64,
    pub candidate_feed_ttl_sec: u64,
    pub fallback_feed_ttl_sec: u64,

    pub rate_limit_requests_per_sec: u32,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 8000),
            personalization_enabled: env_or("PERSONALIZATION_ENABLED", true),
            kill_switch_active: env_or("KILL_SWITCH_ACTIVE", false),
            rollout_percentage: env_or("ROLLOUT_PERCENTAGE", 100),
            default_feed_limit: env_or("DEFAULT_FEED_LIMIT", 20),
            max_feed_limit: env_or("MAX_FEED_LIMIT", 50),
            ranking_timeout_ms: env_or("RANKING_TIMEOUT_MS", 20),
            cache_timeout_ms: env_or("CACHE_TIMEOUT_MS", 5),
            signal_store_timeout_ms: env_or("SIGNAL_STORE_TIMEOUT_MS", 10),
            circuit_breaker_failure_threshold: env_or("CIRCUIT_BREAKER_FAILURE_THRESHOLD", 5),
            circuit_breaker_recovery_timeout_sec: env_or(
                "CIRCUIT_BREAKER_RECOVERY_TIMEOUT_SEC",
                30,
            ),
            tenant_config_ttl_sec: env_or("TENANT_CONFIG_TTL_SEC", 300),
            candidate_feed_ttl_sec: env_or("CANDIDATE_FEED_TTL_SEC", 300),
            fallback_feed_ttl_sec: env_or("FALLBACK_FEED_TTL_SEC", 60),
            rate_limit_requests_per_sec: env_or("RATE_LIMIT_REQUESTS_PER_SEC", 2),
        }
    }

    /// Snapshot of the active settings. Non-blocking in practice: the read
    /// lock is held only for the `Arc` clone.
    pub fn current() -> Arc<Settings> {
        SETTINGS.read().clone()
    }

    /// Swap the active settings. Used by tests and runtime reconfiguration.
    pub fn replace(settings: Settings) {
        *SETTINGS.write() = Arc::new(settings);
    }

    /// Reload the active settings from the environment.
    pub fn reset() {
        Self::replace(Settings::from_env());
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::SETTINGS_GUARD;
    use super::*;

    #[test]
    fn defaults_when_env_unset() {
        let settings = Settings::from_env();
        assert!(settings.personalization_enabled);
        assert!(!settings.kill_switch_active);
        assert_eq!(settings.rollout_percentage, 100);
        assert_eq!(settings.default_feed_limit, 20);
        assert_eq!(settings.max_feed_limit, 50);
        assert_eq!(settings.circuit_breaker_failure_threshold, 5);
        assert_eq!(settings.rate_limit_requests_per_sec, 2);
    }

    #[test]
    fn replace_and_reset_swap_the_cell() {
        let _guard = SETTINGS_GUARD.lock();

        let mut patched = (*Settings::current()).clone();
        patched.kill_switch_active = true;
        patched.rollout_percentage = 25;
        Settings::replace(patched);

        let active = Settings::current();
        assert!(active.kill_switch_active);
        assert_eq!(active.rollout_percentage, 25);

        Settings::reset();
        assert!(!Settings::current().kill_switch_active);
    }
}
