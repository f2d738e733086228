// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! StravAwesome API Server
//!
//! Personal fitness dashboard backend: Google sign-in, Strava OAuth connect,
//! cached activity data, training insights, annual goals, AI coach.

use std::sync::Arc;
use stravawesome::{
    config::Config,
    db::Store,
    middleware::RateLimiter,
    services::{
        cache::{ResponseCache, SWEEP_INTERVAL},
        throttle::{RequestThrottle, DEFAULT_MIN_SPACING},
        ActivityFetcher, AiClient, GoogleOidcVerifier, StravaClient, StravaService, TokenCipher,
    },
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting StravAwesome API");

    let store = Store::connect(&config.gcp_project_id).await?;

    let cipher = TokenCipher::from_config(config.token_sealing_key.as_deref())?;

    let google_verifier = Arc::new(GoogleOidcVerifier::new(&config.google_client_id)?);

    // One throttle for all outbound Strava calls from this process.
    let throttle = RequestThrottle::new(DEFAULT_MIN_SPACING);

    let client = StravaClient::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
    );
    let strava = StravaService::new(client.clone(), store.clone(), cipher);
    let fetcher = ActivityFetcher::new(client, throttle);
    tracing::info!("Strava services initialized");

    let rate_limiter = RateLimiter::with_sweeper(SWEEP_INTERVAL);
    let insights_cache = ResponseCache::with_sweeper(SWEEP_INTERVAL);

    let ai = AiClient::new(
        config.ai_base_url.clone(),
        config.ai_api_key.clone(),
        config.ai_model.clone(),
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        strava,
        fetcher,
        rate_limiter,
        ai,
        google_verifier,
        insights_cache,
    });

    let app = stravawesome::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stravawesome=debug".parse().expect("valid directive"))
                .add_directive("info".parse().expect("valid directive")),
        )
        .with(format)
        .init();
}
