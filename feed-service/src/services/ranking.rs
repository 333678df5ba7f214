//! Ranking engine: the deterministic heart of personalization
//!
//! Pipeline per request: decode cursor → filter → score → sort → editorial
//! overrides → paginate → materialize feed items. CPU-only, no suspension,
//! and a total order on the output: equal scores tie-break on video id so
//! repeated requests page over an identical sequence.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::models::{FeedItem, ScoredVideo, TenantRankingRules, UserSignals, VideoMetadata};

/// Recency boost decays linearly to zero over this horizon.
const RECENCY_DECAY_HOURS: f64 = 48.0;

#[derive(Debug, Serialize, Deserialize)]
struct CursorPayload {
    #[serde(default)]
    offset: usize,
}

#[derive(Debug, Default)]
pub struct RankingEngine;

impl RankingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Rank candidates for a user.
    ///
    /// Returns the page of feed items, the cursor for the next page (only
    /// when one exists) and whether more items remain. Never fails: an empty
    /// pool yields an empty page and an invalid cursor restarts from the
    /// first page.
    pub fn rank(
        &self,
        candidates: &[VideoMetadata],
        user: &UserSignals,
        config: &TenantRankingRules,
        limit: usize,
        cursor: Option<&str>,
    ) -> (Vec<FeedItem>, Option<String>, bool) {
        let now = Utc::now().timestamp();
        let offset = Self::decode_cursor(cursor);

        let filtered = Self::filter_candidates(candidates, user, config);
        let mut scored = Self::score_candidates(&filtered, user, config, now);

        scored.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.video.id.cmp(&b.video.id))
        });

        let ordered = Self::apply_editorial_boosts(scored, config);

        let total = ordered.len();
        let has_more = total > offset + limit;
        let page: Vec<ScoredVideo> = ordered.into_iter().skip(offset).take(limit).collect();
        let items = Self::to_feed_items(&page, now);

        let next_cursor = if has_more {
            Self::encode_cursor(offset + limit)
        } else {
            None
        };

        debug!(
            candidates = candidates.len(),
            filtered = filtered.len(),
            returned = items.len(),
            offset,
            "ranked candidate pool"
        );

        (items, next_cursor, has_more)
    }

    /// Drop candidates the user has watched, carrying an excluded tag, or
    /// sitting above the tenant's maturity cap.
    fn filter_candidates<'a>(
        candidates: &'a [VideoMetadata],
        user: &UserSignals,
        config: &TenantRankingRules,
    ) -> Vec<&'a VideoMetadata> {
        candidates
            .iter()
            .filter(|video| {
                if user.watched_ids.contains(&video.id) {
                    return false;
                }
                if video
                    .tags
                    .iter()
                    .any(|tag| config.filters.exclude_tags.contains(tag))
                {
                    return false;
                }
                if let Some(cap) = config.filters.max_maturity {
                    if video.maturity_rating.exceeds(cap) {
                        return false;
                    }
                }
                true
            })
            .collect()
    }

    /// Base = score × popularity weight; boosts are additive and the final
    /// score is `base × (1 + total_boost)`.
    fn score_candidates(
        candidates: &[&VideoMetadata],
        user: &UserSignals,
        config: &TenantRankingRules,
        now: i64,
    ) -> Vec<ScoredVideo> {
        let weights = &config.boost_weights;

        candidates
            .iter()
            .map(|video| {
                let base_score = video.score * weights.popularity;
                let recency = Self::recency_boost(video, weights.recency, now);
                let affinity = Self::affinity_boost(video, user, weights.user_affinity);
                let total_boost = recency + affinity;
                let final_score = base_score * (1.0 + total_boost);

                let score_breakdown = HashMap::from([
                    ("base".to_string(), base_score),
                    ("recency".to_string(), recency),
                    ("affinity".to_string(), affinity),
                    ("total_boost".to_string(), total_boost),
                    ("final".to_string(), final_score),
                ]);

                ScoredVideo {
                    video: (*video).clone(),
                    final_score,
                    score_breakdown,
                }
            })
            .collect()
    }

    /// Linear decay from the full weight at publication to zero at 48 hours.
    fn recency_boost(video: &VideoMetadata, weight: f64, now: i64) -> f64 {
        let age_hours = (now - video.published_at).max(0) as f64 / 3600.0;
        if age_hours >= RECENCY_DECAY_HOURS {
            return 0.0;
        }
        weight * (1.0 - age_hours / RECENCY_DECAY_HOURS)
    }

    /// The strongest affinity across the video's tags; unmatched tags and
    /// untagged videos contribute nothing.
    fn affinity_boost(video: &VideoMetadata, user: &UserSignals, weight: f64) -> f64 {
        let max_affinity = video
            .tags
            .iter()
            .filter_map(|tag| user.affinities.get(tag).copied())
            .fold(0.0_f64, f64::max);
        weight * max_affinity
    }

    /// Pull editorially pinned videos out of score order and reinsert them at
    /// their target positions, clamped to the sequence length. Positions are
    /// applied ascending; within one position the larger id is inserted
    /// first, leaving the smaller id on the earlier slot.
    fn apply_editorial_boosts(
        scored: Vec<ScoredVideo>,
        config: &TenantRankingRules,
    ) -> Vec<ScoredVideo> {
        if config.editorial_boosts.is_empty() {
            return scored;
        }

        let mut pinned: Vec<(usize, ScoredVideo)> = Vec::new();
        let mut result = Vec::with_capacity(scored.len());
        for item in scored {
            match config.editorial_boosts.get(&item.video.id) {
                Some(&position) => pinned.push((position, item)),
                None => result.push(item),
            }
        }

        pinned.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.video.id.cmp(&a.1.video.id)));
        for (position, item) in pinned {
            let index = position.min(result.len());
            result.insert(index, item);
        }

        result
    }

    fn to_feed_items(scored: &[ScoredVideo], now: i64) -> Vec<FeedItem> {
        scored
            .iter()
            .map(|sv| FeedItem {
                id: sv.video.id.clone(),
                title: sv.video.title.clone(),
                playback_url: format!("https://cdn.example.com/v/{}.m3u8", sv.video.id),
                tracking_token: format!("tok_{}_{}", sv.video.id, now),
                debug_score: Some((sv.final_score * 100.0).round() / 100.0),
            })
            .collect()
    }

    /// Opaque cursors are base64 over a small JSON payload. Anything
    /// undecodable restarts from the first page rather than erroring.
    fn decode_cursor(cursor: Option<&str>) -> usize {
        let Some(cursor) = cursor else {
            return 0;
        };
        let decoded = match BASE64.decode(cursor) {
            Ok(bytes) => bytes,
            Err(_) => {
                warn!(%cursor, "invalid pagination cursor, restarting from offset 0");
                return 0;
            }
        };
        serde_json::from_slice::<CursorPayload>(&decoded)
            .map(|payload| payload.offset)
            .unwrap_or_else(|_| {
                warn!(%cursor, "unparseable pagination cursor, restarting from offset 0");
                0
            })
    }

    fn encode_cursor(offset: usize) -> Option<String> {
        serde_json::to_string(&CursorPayload { offset })
            .ok()
            .map(|json| BASE64.encode(json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoostWeights, MaturityRating, RankingFilters};

    fn candidate(id: &str, score: f64, tags: &[&str], age_hours: i64) -> VideoMetadata {
        VideoMetadata {
            id: id.to_string(),
            title: format!("Video {id}"),
            score,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            maturity_rating: MaturityRating::G,
            published_at: Utc::now().timestamp() - age_hours * 3600,
        }
    }

    fn sporty_user() -> UserSignals {
        UserSignals {
            user_hash: "user_test".to_string(),
            watched_ids: Default::default(),
            affinities: HashMap::from([("sports".to_string(), 0.9)]),
        }
    }

    fn sports_config() -> TenantRankingRules {
        TenantRankingRules {
            tenant_id: "tenant_test".to_string(),
            boost_weights: BoostWeights {
                recency: 1.5,
                popularity: 0.5,
                user_affinity: 2.0,
            },
            filters: RankingFilters::default(),
            editorial_boosts: HashMap::new(),
        }
    }

    fn scenario_candidates() -> Vec<VideoMetadata> {
        vec![
            candidate("v1", 95.0, &["sports", "football", "viral"], 2),
            candidate("v2", 80.0, &["sports", "tennis"], 24),
            candidate("v3", 60.0, &["strategy"], 48),
        ]
    }

    #[test]
    fn happy_path_orders_by_boosted_score() {
        let engine = RankingEngine::new();
        let (items, cursor, has_more) = engine.rank(
            &scenario_candidates(),
            &sporty_user(),
            &sports_config(),
            10,
            None,
        );

        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "v2", "v3"]);
        assert!(!has_more);
        assert!(cursor.is_none());

        // v3 is 48h old: no recency boost, no matching affinity, so its
        // final score is exactly base = 60 * 0.5.
        assert_eq!(items[2].debug_score, Some(30.0));
        // v1 gets both boosts, well above its base of 47.5.
        assert!(items[0].debug_score.unwrap() > 95.0);
    }

    #[test]
    fn watched_videos_are_filtered() {
        let engine = RankingEngine::new();
        let mut user = sporty_user();
        user.watched_ids.insert("v1".to_string());

        let (items, _, _) = engine.rank(
            &scenario_candidates(),
            &user,
            &sports_config(),
            10,
            None,
        );
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["v2", "v3"]);
    }

    #[test]
    fn excluded_tags_are_filtered() {
        let engine = RankingEngine::new();
        let mut config = sports_config();
        config.filters.exclude_tags.insert("strategy".to_string());

        let (items, _, _) = engine.rank(
            &scenario_candidates(),
            &sporty_user(),
            &config,
            10,
            None,
        );
        assert!(items.iter().all(|i| i.id != "v3"));
    }

    #[test]
    fn maturity_cap_is_enforced_on_the_ladder() {
        let engine = RankingEngine::new();
        let mut candidates = scenario_candidates();
        candidates[0].maturity_rating = MaturityRating::R;

        let mut config = sports_config();
        config.filters.max_maturity = Some(MaturityRating::Pg13);
        let (items, _, _) = engine.rank(&candidates, &sporty_user(), &config, 10, None);
        assert!(items.iter().all(|i| i.id != "v1"));

        config.filters.max_maturity = Some(MaturityRating::R);
        let (items, _, _) = engine.rank(&candidates, &sporty_user(), &config, 10, None);
        assert!(items.iter().any(|i| i.id == "v1"));
    }

    #[test]
    fn unknown_maturity_is_permitted() {
        let engine = RankingEngine::new();
        let mut candidates = scenario_candidates();
        candidates[0].maturity_rating = MaturityRating::Unknown;

        let mut config = sports_config();
        config.filters.max_maturity = Some(MaturityRating::G);
        let (items, _, _) = engine.rank(&candidates, &sporty_user(), &config, 10, None);
        assert!(items.iter().any(|i| i.id == "v1"));
    }

    #[test]
    fn equal_scores_tie_break_on_id_ascending() {
        let engine = RankingEngine::new();
        // Both old enough for zero recency, no affinities: identical scores.
        let candidates = vec![
            candidate("b", 50.0, &[], 100),
            candidate("a", 50.0, &[], 100),
        ];
        let user = UserSignals::empty("user_x");
        let config = TenantRankingRules::default_for("tenant_x");

        let (items, _, _) = engine.rank(&candidates, &user, &config, 10, None);
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn editorial_pin_moves_item_to_front() {
        let engine = RankingEngine::new();
        let candidates = vec![
            candidate("a", 90.0, &[], 100),
            candidate("b", 80.0, &[], 100),
            candidate("c", 70.0, &[], 100),
            candidate("d", 60.0, &[], 100),
            candidate("e", 10.0, &[], 100),
        ];
        let user = UserSignals::empty("user_x");
        let mut config = TenantRankingRules::default_for("tenant_x");
        config.editorial_boosts.insert("e".to_string(), 0);

        let (items, _, _) = engine.rank(&candidates, &user, &config, 10, None);
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["e", "a", "b", "c", "d"]);
    }

    #[test]
    fn colliding_editorial_positions_keep_smaller_id_first() {
        let engine = RankingEngine::new();
        let candidates = vec![
            candidate("a", 90.0, &[], 100),
            candidate("e1", 10.0, &[], 100),
            candidate("e2", 5.0, &[], 100),
        ];
        let user = UserSignals::empty("user_x");
        let mut config = TenantRankingRules::default_for("tenant_x");
        config.editorial_boosts.insert("e1".to_string(), 0);
        config.editorial_boosts.insert("e2".to_string(), 0);

        let (items, _, _) = engine.rank(&candidates, &user, &config, 10, None);
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2", "a"]);
    }

    #[test]
    fn editorial_position_past_the_end_appends() {
        let engine = RankingEngine::new();
        let candidates = vec![
            candidate("a", 90.0, &[], 100),
            candidate("b", 80.0, &[], 100),
            candidate("pin", 99.0, &[], 100),
        ];
        let user = UserSignals::empty("user_x");
        let mut config = TenantRankingRules::default_for("tenant_x");
        config.editorial_boosts.insert("pin".to_string(), 10);

        let (items, _, _) = engine.rank(&candidates, &user, &config, 10, None);
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "pin"]);
    }

    #[test]
    fn pagination_round_trips_through_the_cursor() {
        let engine = RankingEngine::new();
        let candidates: Vec<VideoMetadata> = (0..10)
            .map(|i| candidate(&format!("v{i}"), 100.0 - i as f64, &[], 100))
            .collect();
        let user = UserSignals::empty("user_x");
        let config = TenantRankingRules::default_for("tenant_x");

        let (page1, cursor1, more1) = engine.rank(&candidates, &user, &config, 3, None);
        assert_eq!(page1[0].id, "v0");
        assert_eq!(page1.len(), 3);
        assert!(more1);
        let cursor1 = cursor1.expect("next cursor on a partial page");

        let (page2, _, more2) = engine.rank(&candidates, &user, &config, 3, Some(&cursor1));
        assert_eq!(page2[0].id, "v3");
        assert!(more2);

        // Concatenated pages equal a single large request.
        let (full, _, _) = engine.rank(&candidates, &user, &config, 6, None);
        let paged_ids: Vec<String> = page1
            .iter()
            .chain(page2.iter())
            .map(|i| i.id.clone())
            .collect();
        let full_ids: Vec<String> = full.iter().map(|i| i.id.clone()).collect();
        assert_eq!(paged_ids, full_ids);
    }

    #[test]
    fn corrupted_cursor_restarts_from_first_page() {
        let engine = RankingEngine::new();
        let candidates = scenario_candidates();
        let user = sporty_user();
        let config = sports_config();

        let (fresh, _, _) = engine.rank(&candidates, &user, &config, 2, None);
        let (garbled, _, _) =
            engine.rank(&candidates, &user, &config, 2, Some("!!not-base64!!"));
        let fresh_ids: Vec<&str> = fresh.iter().map(|i| i.id.as_str()).collect();
        let garbled_ids: Vec<&str> = garbled.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(fresh_ids, garbled_ids);

        // Valid base64 over non-JSON also restarts cleanly.
        let bogus = BASE64.encode("definitely not json");
        let (from_bogus, _, _) = engine.rank(&candidates, &user, &config, 2, Some(&bogus));
        let bogus_ids: Vec<&str> = from_bogus.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(fresh_ids, bogus_ids);
    }

    #[test]
    fn empty_candidates_produce_an_empty_page() {
        let engine = RankingEngine::new();
        let user = UserSignals::empty("user_x");
        let config = TenantRankingRules::default_for("tenant_x");

        let (items, cursor, has_more) = engine.rank(&[], &user, &config, 10, None);
        assert!(items.is_empty());
        assert!(cursor.is_none());
        assert!(!has_more);
    }

    #[test]
    fn raising_weights_never_lowers_the_score() {
        let engine = RankingEngine::new();
        let candidates = vec![candidate("v1", 80.0, &["sports"], 2)];
        let user = sporty_user();

        let baseline = TenantRankingRules::default_for("tenant_x");
        let (base_items, _, _) = engine.rank(&candidates, &user, &baseline, 10, None);

        for raised in [
            BoostWeights {
                recency: 2.0,
                ..BoostWeights::default()
            },
            BoostWeights {
                popularity: 2.0,
                ..BoostWeights::default()
            },
            BoostWeights {
                user_affinity: 2.0,
                ..BoostWeights::default()
            },
        ] {
            let mut config = TenantRankingRules::default_for("tenant_x");
            config.boost_weights = raised;
            let (items, _, _) = engine.rank(&candidates, &user, &config, 10, None);
            assert!(items[0].debug_score.unwrap() >= base_items[0].debug_score.unwrap());
        }
    }

    #[test]
    fn debug_score_is_rounded_to_two_decimals() {
        let engine = RankingEngine::new();
        // No boosts apply, so the final score is the raw base score.
        let candidates = vec![candidate("v1", 33.333333, &[], 100)];
        let user = UserSignals::empty("user_x");
        let config = TenantRankingRules::default_for("tenant_x");

        let (items, _, _) = engine.rank(&candidates, &user, &config, 10, None);
        assert_eq!(items[0].debug_score, Some(33.33));
    }

    #[test]
    fn feed_items_carry_playback_and_tracking_fields() {
        let engine = RankingEngine::new();
        let (items, _, _) = engine.rank(
            &scenario_candidates(),
            &sporty_user(),
            &sports_config(),
            1,
            None,
        );
        assert_eq!(items[0].playback_url, "https://cdn.example.com/v/v1.m3u8");
        assert!(items[0].tracking_token.starts_with("tok_v1_"));
    }
}
