// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! HTTP route handlers.
//!
//! Every route group wraps the same pipeline: session check (where the
//! group requires it), a named rate-limit check, the handler, and the
//! uniform response envelope.

pub mod auth;
pub mod chat;
pub mod goals;
pub mod strava;

use crate::middleware::auth::require_auth;
use crate::middleware::rate_limit::{limits, rate_limit};
use crate::AppState;
use axum::http::{header, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
    })
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer - allow requests from frontend URL and localhost (for dev)
    let frontend_url = state.config.frontend_url.clone();
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::predicate(
            move |origin: &axum::http::HeaderValue, _request_parts: &axum::http::request::Parts| {
                let origin_str = origin.to_str().unwrap_or("");
                origin_str == frontend_url
                    || origin_str.starts_with("http://localhost")
                    || origin_str.starts_with("http://127.0.0.1")
            },
        ))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Public auth routes: rate limited by IP.
    let auth_public = auth::public_routes().route_layer(middleware::from_fn_with_state(
        (state.clone(), limits::AUTH),
        rate_limit,
    ));

    // Session-only auth routes (connect/disconnect). The auth layer is
    // outermost so the limiter keys by user.
    let auth_protected = auth::protected_routes()
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), limits::AUTH),
            rate_limit,
        ))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Data endpoints: 60 req/min per user.
    let data_routes = strava::routes()
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), limits::DATA),
            rate_limit,
        ))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Goal CRUD: generic API limit.
    let goal_routes = goals::routes()
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), limits::API),
            rate_limit,
        ))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // Coach chat: tighter AI limit.
    let ai_routes = chat::routes()
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), limits::AI),
            rate_limit,
        ))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_check))
        .merge(auth_public)
        .merge(auth_protected)
        .merge(data_routes)
        .merge(goal_routes)
        .merge(ai_routes)
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
