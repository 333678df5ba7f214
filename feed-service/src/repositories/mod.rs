//! Repository contracts for the data the orchestrator composes
//!
//! Kept as three narrow capabilities rather than one wide interface: the
//! signal store, the candidate pool, and tenant configuration each have a
//! different backing store in production.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{TenantRankingRules, UserSignals, VideoMetadata};

pub mod memory;

pub use memory::{
    InMemoryCandidateRepository, InMemoryTenantConfigRepository, InMemoryUserSignalRepository,
};

/// User signal data access.
#[async_trait]
pub trait UserSignalRepository: Send + Sync {
    /// Fetch signals by user hash. Unknown users yield empty signals
    /// (the cold-start path), never an absent value.
    async fn get_signals(&self, user_hash: &str) -> Result<UserSignals>;

    /// Persist user signals.
    async fn save_signals(&self, signals: UserSignals) -> Result<()>;
}

/// Video candidate data access.
#[async_trait]
pub trait CandidateRepository: Send + Sync {
    /// All active candidates for a tenant; empty for unknown tenants.
    async fn get_candidates(&self, tenant_id: &str) -> Result<Vec<VideoMetadata>>;

    /// Pre-computed popularity-sorted fallback feed for a tenant.
    async fn get_fallback_feed(&self, tenant_id: &str) -> Result<Vec<VideoMetadata>>;
}

/// Tenant ranking configuration access.
#[async_trait]
pub trait TenantConfigRepository: Send + Sync {
    /// Configured rules, or `None` when the tenant has no explicit config.
    async fn get_config(&self, tenant_id: &str) -> Result<Option<TenantRankingRules>>;

    /// Safe defaults for tenants without configuration.
    fn get_default_config(&self, tenant_id: &str) -> TenantRankingRules;
}
