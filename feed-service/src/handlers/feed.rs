//! Feed endpoint: request parsing, conditional responses, cache shaping
//!
//! The handler validates input, delegates to the orchestrator, then shapes
//! the response for CDN and browser caches: a weak ETag over the item ids,
//! `304` on a matching `If-None-Match`, and cache directives that differ for
//! personalized versus shared fallback content.

use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::models::FeedItem;

const DEFAULT_TENANT: &str = "tenant_sports";

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    /// Anonymized user identifier
    pub user_hash: String,
    /// Page size, 1..=50
    pub limit: Option<usize>,
    /// Opaque pagination cursor from a previous response
    pub cursor: Option<String>,
}

/// GET /v1/feed
pub async fn get_feed(
    req: HttpRequest,
    query: web::Query<FeedQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let settings = Settings::current();

    if query.user_hash.is_empty() {
        return Err(AppError::Validation("user_hash must not be empty".into()));
    }
    let limit = query.limit.unwrap_or(settings.default_feed_limit);
    if !(1..=50).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and 50, got {limit}"
        )));
    }
    let limit = limit.min(settings.max_feed_limit);

    let tenant_id = req
        .headers()
        .get("X-Tenant-ID")
        .and_then(|value| value.to_str().ok())
        .unwrap_or(DEFAULT_TENANT);
    let if_none_match = req
        .headers()
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok());

    let feed = state
        .feed_service
        .get_feed(tenant_id, &query.user_hash, limit, query.cursor.as_deref())
        .await?;

    let etag = weak_etag(&feed.items);
    if let (Some(tag), Some(candidate)) = (etag.as_deref(), if_none_match) {
        if candidate == tag {
            return Ok(HttpResponse::NotModified().finish());
        }
    }

    let mut builder = HttpResponse::Ok();
    if let Some(tag) = &etag {
        builder.insert_header((header::ETAG, tag.as_str()));
    }

    if feed.is_personalized && !feed.degraded {
        builder.insert_header((header::CACHE_CONTROL, "private, max-age=30"));
        builder.insert_header((header::VARY, "X-User-Hash"));
    } else {
        // Shared fallback content is safe for public caches.
        builder.insert_header((
            header::CACHE_CONTROL,
            "public, max-age=30, stale-while-revalidate=15",
        ));
        builder.insert_header((header::VARY, "Accept-Encoding"));
    }
    builder.insert_header((
        "X-Personalized",
        if feed.is_personalized { "true" } else { "false" },
    ));

    Ok(builder.json(feed))
}

/// Weak validator over the ordered item ids; responses without items carry
/// no ETag.
fn weak_etag(items: &[FeedItem]) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let joined: String = items.iter().map(|item| item.id.as_str()).collect();
    let digest = format!("{:x}", md5::compute(joined.as_bytes()));
    Some(format!("W/\"{}\"", &digest[..16]))
}
