//! In-memory repository implementations
//!
//! Fixture-driven stand-ins for the production stores (signal store, candidate
//! cache, tenant config cache). Used by tests and the default wiring.

use async_trait::async_trait;
use chrono::Utc;
use mem_cache::MemCache;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::Result;
use crate::models::{
    BoostWeights, MaturityRating, RankingFilters, TenantRankingRules, UserSignals, VideoMetadata,
};
use crate::repositories::{CandidateRepository, TenantConfigRepository, UserSignalRepository};

const FALLBACK_FEED_SIZE: usize = 3;

fn video(
    id: &str,
    title: &str,
    score: f64,
    tags: &[&str],
    published_at: i64,
) -> VideoMetadata {
    VideoMetadata {
        id: id.to_string(),
        title: title.to_string(),
        score,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        maturity_rating: MaturityRating::G,
        published_at,
    }
}

/// Simulates the user signal store (Redis/Scylla in production).
pub struct InMemoryUserSignalRepository {
    cache: MemCache<UserSignals>,
}

impl InMemoryUserSignalRepository {
    pub fn new() -> Self {
        let repo = Self {
            cache: MemCache::new(None),
        };
        repo.seed_fixtures();
        repo
    }

    fn seed_fixtures(&self) {
        let users = [
            UserSignals {
                user_hash: "user_sporty".to_string(),
                // Already watched the tennis highlights
                watched_ids: ["v2"].iter().map(|s| s.to_string()).collect(),
                affinities: [("sports", 0.9), ("football", 0.8), ("strategy", 0.1)]
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect(),
            },
            UserSignals {
                user_hash: "user_newsy".to_string(),
                watched_ids: ["n1"].iter().map(|s| s.to_string()).collect(),
                affinities: [("politics", 0.9), ("finance", 0.7)]
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect(),
            },
            UserSignals::empty("user_new"),
        ];
        for user in users {
            let key = user.user_hash.clone();
            self.cache.set(&key, user, None);
        }
    }
}

impl Default for InMemoryUserSignalRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserSignalRepository for InMemoryUserSignalRepository {
    async fn get_signals(&self, user_hash: &str) -> Result<UserSignals> {
        Ok(self
            .cache
            .get(user_hash)
            .unwrap_or_else(|| UserSignals::empty(user_hash)))
    }

    async fn save_signals(&self, signals: UserSignals) -> Result<()> {
        let key = signals.user_hash.clone();
        self.cache.set(&key, signals, None);
        Ok(())
    }
}

/// Simulates the candidate cache, including the precomputed fallback feed.
pub struct InMemoryCandidateRepository {
    cache: MemCache<Vec<VideoMetadata>>,
    fallback: HashMap<String, Vec<VideoMetadata>>,
}

impl InMemoryCandidateRepository {
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        let hour = 3600;

        let sports_videos = vec![
            video(
                "v1",
                "Amazing Goal Messi",
                95.0,
                &["sports", "football", "viral"],
                now - 2 * hour,
            ),
            video("v2", "Tennis Highlights", 80.0, &["sports", "tennis"], now - 24 * hour),
            video(
                "v3",
                "Chess Championship",
                60.0,
                &["strategy", "board_games"],
                now - 48 * hour,
            ),
            video("v4", "Funny Cat Fails", 85.0, &["viral", "animals"], now - 12 * hour),
            video(
                "v5",
                "Live: Stadium Construction",
                40.0,
                &["news", "construction"],
                now - hour,
            ),
        ];

        let news_videos = vec![
            video("n1", "Election Results", 99.0, &["politics", "news"], now - hour),
            video("n2", "Weather Forecast", 70.0, &["news", "weather"], now - 4 * hour),
            video("n3", "Tech Stock Crash", 88.0, &["finance", "tech"], now - 10 * hour),
            video("n4", "Cute Panda Born", 92.0, &["animals", "positive"], now - 72 * hour),
        ];

        let cache = MemCache::new(None);
        let mut fallback = HashMap::new();
        fallback.insert("tenant_sports".to_string(), Self::top_by_score(&sports_videos));
        fallback.insert("tenant_news".to_string(), Self::top_by_score(&news_videos));
        cache.set("tenant_sports", sports_videos, None);
        cache.set("tenant_news", news_videos, None);

        Self { cache, fallback }
    }

    fn top_by_score(videos: &[VideoMetadata]) -> Vec<VideoMetadata> {
        let mut sorted = videos.to_vec();
        sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        sorted.truncate(FALLBACK_FEED_SIZE);
        sorted
    }
}

impl Default for InMemoryCandidateRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandidateRepository for InMemoryCandidateRepository {
    async fn get_candidates(&self, tenant_id: &str) -> Result<Vec<VideoMetadata>> {
        Ok(self.cache.get(tenant_id).unwrap_or_default())
    }

    async fn get_fallback_feed(&self, tenant_id: &str) -> Result<Vec<VideoMetadata>> {
        Ok(self.fallback.get(tenant_id).cloned().unwrap_or_default())
    }
}

/// Simulates the tenant configuration cache.
pub struct InMemoryTenantConfigRepository {
    cache: MemCache<TenantRankingRules>,
}

impl InMemoryTenantConfigRepository {
    pub fn new() -> Self {
        let repo = Self {
            cache: MemCache::new(None),
        };
        repo.seed_fixtures();
        repo
    }

    fn seed_fixtures(&self) {
        let configs = [
            TenantRankingRules {
                tenant_id: "tenant_sports".to_string(),
                boost_weights: BoostWeights {
                    recency: 1.5,
                    popularity: 0.5,
                    user_affinity: 2.0,
                },
                filters: RankingFilters {
                    exclude_tags: ["politics"].iter().map(|s| s.to_string()).collect(),
                    max_maturity: None,
                },
                editorial_boosts: HashMap::new(),
            },
            TenantRankingRules {
                tenant_id: "tenant_news".to_string(),
                boost_weights: BoostWeights {
                    recency: 2.0,
                    popularity: 1.0,
                    user_affinity: 0.5,
                },
                filters: RankingFilters {
                    exclude_tags: Default::default(),
                    max_maturity: Some(MaturityRating::Pg),
                },
                editorial_boosts: HashMap::new(),
            },
        ];
        for config in configs {
            let key = config.tenant_id.clone();
            self.cache.set(&key, config, None);
        }
    }
}

impl Default for InMemoryTenantConfigRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TenantConfigRepository for InMemoryTenantConfigRepository {
    async fn get_config(&self, tenant_id: &str) -> Result<Option<TenantRankingRules>> {
        Ok(self.cache.get(tenant_id))
    }

    fn get_default_config(&self, tenant_id: &str) -> TenantRankingRules {
        TenantRankingRules::default_for(tenant_id)
    }
}
