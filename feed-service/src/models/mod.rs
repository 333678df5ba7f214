//! Domain models for the personalization pipeline
//!
//! Everything here is immutable within a request; the repositories own the
//! backing stores and hand out clones.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Content maturity ladder. Unknown ratings never block a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum MaturityRating {
    #[serde(rename = "G")]
    G,
    #[serde(rename = "PG")]
    Pg,
    #[serde(rename = "PG-13")]
    Pg13,
    #[serde(rename = "R")]
    R,
    #[serde(rename = "NC-17")]
    Nc17,
    Unknown,
}

impl Default for MaturityRating {
    fn default() -> Self {
        MaturityRating::G
    }
}

impl From<String> for MaturityRating {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "G" => MaturityRating::G,
            "PG" => MaturityRating::Pg,
            "PG-13" => MaturityRating::Pg13,
            "R" => MaturityRating::R,
            "NC-17" => MaturityRating::Nc17,
            _ => MaturityRating::Unknown,
        }
    }
}

impl MaturityRating {
    fn level(&self) -> Option<u8> {
        match self {
            MaturityRating::G => Some(0),
            MaturityRating::Pg => Some(1),
            MaturityRating::Pg13 => Some(2),
            MaturityRating::R => Some(3),
            MaturityRating::Nc17 => Some(4),
            MaturityRating::Unknown => None,
        }
    }

    /// Whether this rating sits above `cap` on the ladder. Unknown on either
    /// side is permissive.
    pub fn exceeds(&self, cap: MaturityRating) -> bool {
        match (self.level(), cap.level()) {
            (Some(own), Some(cap)) => own > cap,
            _ => false,
        }
    }
}

/// Video candidate with the metadata ranking needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Unique within a tenant
    pub id: String,
    pub title: String,
    /// Base popularity score in [0, 100]
    pub score: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub maturity_rating: MaturityRating,
    /// Unix timestamp (seconds) of publication
    pub published_at: i64,
}

/// A user's historical interaction data, keyed by anonymized hash.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSignals {
    pub user_hash: String,
    #[serde(default)]
    pub watched_ids: HashSet<String>,
    /// Tag affinity scores in [0.0, 1.0]
    #[serde(default)]
    pub affinities: HashMap<String, f64>,
}

impl UserSignals {
    /// Empty signals for a user with no recorded history.
    pub fn empty(user_hash: impl Into<String>) -> Self {
        Self {
            user_hash: user_hash.into(),
            ..Self::default()
        }
    }

    pub fn is_cold_start(&self) -> bool {
        self.watched_ids.is_empty() && self.affinities.is_empty()
    }
}

/// Weight multipliers for the ranking factors. Missing keys default to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostWeights {
    #[serde(default = "default_weight")]
    pub recency: f64,
    #[serde(default = "default_weight")]
    pub popularity: f64,
    #[serde(default = "default_weight")]
    pub user_affinity: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Default for BoostWeights {
    fn default() -> Self {
        Self {
            recency: 1.0,
            popularity: 1.0,
            user_affinity: 1.0,
        }
    }
}

/// Content filters applied before scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingFilters {
    #[serde(default)]
    pub exclude_tags: HashSet<String>,
    #[serde(default)]
    pub max_maturity: Option<MaturityRating>,
}

/// Tenant-specific personalization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRankingRules {
    pub tenant_id: String,
    #[serde(default)]
    pub boost_weights: BoostWeights,
    #[serde(default)]
    pub filters: RankingFilters,
    /// Video id → fixed 0-based output position (editorial override)
    #[serde(default)]
    pub editorial_boosts: HashMap<String, usize>,
}

impl TenantRankingRules {
    /// Safe defaults for unknown tenants: all weights 1.0, no filters,
    /// no editorial overrides.
    pub fn default_for(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            boost_weights: BoostWeights::default(),
            filters: RankingFilters::default(),
            editorial_boosts: HashMap::new(),
        }
    }
}

/// A candidate with its computed score, transient within a request.
#[derive(Debug, Clone)]
pub struct ScoredVideo {
    pub video: VideoMetadata,
    pub final_score: f64,
    pub score_breakdown: HashMap<String, f64>,
}

/// Single item in the feed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub playback_url: String,
    pub tracking_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_score: Option<f64>,
}

/// Feed endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedResponse {
    pub items: Vec<FeedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub has_more: bool,
    /// True when a fallback was served because of an error or data gap
    /// (intentional fallbacks via kill switch or rollout stay false)
    pub degraded: bool,
    pub is_personalized: bool,
}
