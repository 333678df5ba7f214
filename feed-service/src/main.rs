use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feed_service::config::Settings;
use feed_service::middleware::RateLimit;
use feed_service::{handlers, AppState};

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let settings = Settings::current();

    info!("Starting feed-service on {}:{}", settings.host, settings.port);
    info!("Personalization enabled: {}", settings.personalization_enabled);
    info!("Kill switch active: {}", settings.kill_switch_active);
    info!("Rollout percentage: {}", settings.rollout_percentage);

    let state = AppState::new();
    let rate_limit = RateLimit::new(settings.rate_limit_requests_per_sec);
    let bind_addr = (settings.host.clone(), settings.port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .route("/health", web::get().to(handlers::health::health_check))
            .route(
                "/health/ready",
                web::get().to(handlers::health::readiness_check),
            )
            .service(
                web::scope("/v1")
                    .wrap(rate_limit.clone())
                    .route("/feed", web::get().to(handlers::feed::get_feed)),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
    .context("HTTP server error")
}
