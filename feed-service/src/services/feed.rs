//! Feed orchestrator
//!
//! Composes feature flags, repositories, the ranking engine and the circuit
//! breaker into the request path, degrading to the tenant's fallback feed
//! whenever personalization cannot be served. `degraded` is true only for
//! fallbacks caused by errors or missing data; gates (kill switch, rollout)
//! produce intentional, non-degraded fallbacks.

use chrono::Utc;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info, warn};

use resilience::CircuitBreaker;

use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::models::{FeedItem, FeedResponse, VideoMetadata};
use crate::repositories::{CandidateRepository, TenantConfigRepository, UserSignalRepository};
use crate::services::{FeatureFlags, RankingEngine};

/// Candidate pools are truncated to this size before ranking, preserving
/// source order.
const MAX_CANDIDATE_POOL: usize = 200;

pub struct FeedService {
    user_signals: Arc<dyn UserSignalRepository>,
    candidates: Arc<dyn CandidateRepository>,
    tenant_config: Arc<dyn TenantConfigRepository>,
    feature_flags: Arc<FeatureFlags>,
    ranking: RankingEngine,
    breaker: Arc<CircuitBreaker>,
}

impl FeedService {
    pub fn new(
        user_signals: Arc<dyn UserSignalRepository>,
        candidates: Arc<dyn CandidateRepository>,
        tenant_config: Arc<dyn TenantConfigRepository>,
        feature_flags: Arc<FeatureFlags>,
        ranking: RankingEngine,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            user_signals,
            candidates,
            tenant_config,
            feature_flags,
            ranking,
            breaker,
        }
    }

    /// Entry point for the feed endpoint.
    pub async fn get_feed(
        &self,
        tenant_id: &str,
        user_hash: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<FeedResponse> {
        let started = Instant::now();
        let settings = Settings::current();

        let mut personalized = self
            .feature_flags
            .is_personalization_enabled(tenant_id, user_hash);

        // Secondary rollout gate, configured independently of the flag
        // service but sharing its bucketing scheme.
        if personalized && FeatureFlags::rollout_bucket(user_hash) >= settings.rollout_percentage {
            info!(%user_hash, "user excluded from personalization by rollout");
            personalized = false;
        }

        if !personalized {
            info!(%tenant_id, "personalization disabled, serving fallback");
            return self.fallback_feed(tenant_id, limit, false).await;
        }

        match self
            .personalized_feed(tenant_id, user_hash, limit, cursor)
            .await
        {
            Ok(response) => {
                info!(
                    %tenant_id,
                    items = response.items.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "personalized feed served"
                );
                Ok(response)
            }
            Err(e) => {
                error!(%tenant_id, error = %e, "personalization failed, falling back");
                self.fallback_feed(tenant_id, limit, true).await
            }
        }
    }

    /// Full personalization flow: concurrent fetches under per-dependency
    /// budgets, then ranking through the circuit breaker.
    async fn personalized_feed(
        &self,
        tenant_id: &str,
        user_hash: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<FeedResponse> {
        let settings = Settings::current();
        let signal_budget = Duration::from_millis(settings.signal_store_timeout_ms);
        let cache_budget = Duration::from_millis(settings.cache_timeout_ms);

        let (signals, candidates, config) = tokio::join!(
            timeout(signal_budget, self.user_signals.get_signals(user_hash)),
            timeout(cache_budget, self.candidates.get_candidates(tenant_id)),
            timeout(cache_budget, self.tenant_config.get_config(tenant_id)),
        );

        let user = budgeted(signals, "user signal store")?;
        let mut candidates = budgeted(candidates, "candidate cache")?;
        let config = budgeted(config, "tenant config cache")?;

        if candidates.is_empty() {
            warn!(%tenant_id, "no candidates available, serving fallback");
            return self.fallback_feed(tenant_id, limit, true).await;
        }

        let config = match config {
            Some(config) => config,
            None => self.tenant_config.get_default_config(tenant_id),
        };

        candidates.truncate(MAX_CANDIDATE_POOL);

        let (items, next_cursor, has_more) = self.breaker.call_or(
            || -> std::result::Result<_, AppError> {
                Ok(self.ranking.rank(&candidates, &user, &config, limit, cursor))
            },
            || popularity_fallback(&candidates, limit),
        );

        Ok(FeedResponse {
            items,
            next_cursor,
            has_more,
            degraded: false,
            is_personalized: true,
        })
    }

    /// Non-personalized fallback from the tenant's precomputed feed. The only
    /// way this surfaces an error is the fallback feed itself being
    /// unavailable.
    async fn fallback_feed(
        &self,
        tenant_id: &str,
        limit: usize,
        degraded: bool,
    ) -> Result<FeedResponse> {
        let fallback = self.candidates.get_fallback_feed(tenant_id).await?;
        let now = Utc::now().timestamp();

        let items: Vec<FeedItem> = fallback
            .iter()
            .take(limit)
            .map(|video| FeedItem {
                id: video.id.clone(),
                title: video.title.clone(),
                playback_url: format!("https://cdn.example.com/v/{}.m3u8", video.id),
                tracking_token: format!("fallback_{}_{}", video.id, now),
                debug_score: Some(video.score),
            })
            .collect();

        info!(%tenant_id, items = items.len(), degraded, "fallback feed served");

        Ok(FeedResponse {
            items,
            next_cursor: None,
            has_more: false,
            degraded,
            is_personalized: false,
        })
    }
}

/// Inline fallback for the circuit breaker: the already-fetched candidates by
/// raw popularity, no filters, no editorial overrides, no pagination.
fn popularity_fallback(
    candidates: &[VideoMetadata],
    limit: usize,
) -> (Vec<FeedItem>, Option<String>, bool) {
    let now = Utc::now().timestamp();
    let mut by_popularity: Vec<&VideoMetadata> = candidates.iter().collect();
    by_popularity.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let items: Vec<FeedItem> = by_popularity
        .into_iter()
        .take(limit)
        .map(|video| FeedItem {
            id: video.id.clone(),
            title: video.title.clone(),
            playback_url: format!("https://cdn.example.com/v/{}.m3u8", video.id),
            tracking_token: format!("cb_fallback_{}_{}", video.id, now),
            debug_score: Some(video.score),
        })
        .collect();

    (items, None, false)
}

fn budgeted<T>(
    outcome: std::result::Result<Result<T>, tokio::time::error::Elapsed>,
    dependency: &str,
) -> Result<T> {
    match outcome {
        Ok(inner) => inner,
        Err(_) => Err(AppError::Unavailable(format!("{dependency} timed out"))),
    }
}
