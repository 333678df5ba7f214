//! Feature flag evaluation: kill switch plus percentage rollout
//!
//! Rollout bucketing must be stable for a given user hash across processes,
//! so A/B cohorts stay consistent: MD5 of the hash, first four bytes as a
//! big-endian integer, modulo 100.

use parking_lot::RwLock;

use crate::config::Settings;

pub struct FeatureFlags {
    rollout_percentage: RwLock<f64>,
}

impl FeatureFlags {
    /// `rollout_percentage` is the share of users (0-100) that receive the
    /// personalized feed when the flag itself is on.
    pub fn new(rollout_percentage: f64) -> Self {
        Self {
            rollout_percentage: RwLock::new(rollout_percentage.clamp(0.0, 100.0)),
        }
    }

    /// Whether personalization applies to this request.
    ///
    /// Precedence: kill switch, then the global enable, then the rollout
    /// bucket.
    pub fn is_personalization_enabled(&self, _tenant_id: &str, user_hash: &str) -> bool {
        let settings = Settings::current();

        if settings.kill_switch_active {
            return false;
        }
        if !settings.personalization_enabled {
            return false;
        }

        let percentage = *self.rollout_percentage.read();
        if percentage < 100.0 {
            return (Self::rollout_bucket(user_hash) as f64) < percentage;
        }

        true
    }

    pub fn is_kill_switch_active(&self) -> bool {
        Settings::current().kill_switch_active
    }

    /// Deterministic bucket in [0, 100) for a user hash.
    pub fn rollout_bucket(user_hash: &str) -> u32 {
        let digest = md5::compute(user_hash.as_bytes());
        u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) % 100
    }

    /// Update the rollout percentage at runtime, clamped to [0, 100].
    pub fn set_rollout_percentage(&self, percentage: f64) {
        *self.rollout_percentage.write() = percentage.clamp(0.0, 100.0);
    }
}
