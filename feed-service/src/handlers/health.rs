//! Health endpoints for orchestration probes

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::app_state::AppState;
use crate::config::Settings;

/// GET /health
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "healthy" }))
}

/// GET /health/ready
///
/// Readiness includes the ranking circuit breaker and the feature-flag
/// snapshot so rollouts and incidents are visible from probes.
pub async fn readiness_check(state: web::Data<AppState>) -> HttpResponse {
    let settings = Settings::current();

    HttpResponse::Ok().json(json!({
        "status": "ready",
        "circuit_breaker": {
            "name": state.circuit_breaker.name(),
            "state": state.circuit_breaker.state().as_str(),
        },
        "feature_flags": {
            "personalization_enabled": settings.personalization_enabled,
            "kill_switch_active": settings.kill_switch_active,
        },
    }))
}
