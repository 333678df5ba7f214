/// Error types for the feed service
///
/// Every variant maps to an HTTP status and a stable error code. The feed
/// path itself almost never surfaces these: ranking and repository failures
/// are absorbed into a degraded fallback response upstream, so a 5xx only
/// escapes when the fallback itself cannot be built.
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::{json, Value};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    #[error("Too many requests. Please slow down.")]
    RateLimit { retry_after_seconds: u64 },

    #[error("Service temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("Circuit breaker open for: {0}")]
    CircuitOpen(String),

    #[error("Ranking error: {0}")]
    Ranking(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::RateLimit { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::CircuitOpen(_) => "CIRCUIT_BREAKER_OPEN",
            AppError::Ranking(_) => "RANKING_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn details(&self) -> Value {
        match self {
            AppError::NotFound { resource, id } => {
                json!({ "resource": resource, "identifier": id })
            }
            AppError::RateLimit {
                retry_after_seconds,
            } => json!({ "retry_after_seconds": retry_after_seconds }),
            AppError::Unavailable(service) | AppError::CircuitOpen(service) => {
                json!({ "service": service })
            }
            _ => json!({}),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unavailable(_) | AppError::CircuitOpen(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Ranking(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let AppError::RateLimit {
            retry_after_seconds,
        } = self
        {
            builder.insert_header(("Retry-After", retry_after_seconds.to_string()));
        }
        builder.json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
                "details": self.details(),
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
