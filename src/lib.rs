// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! StravAwesome backend: personal fitness dashboard API.
//!
//! This crate provides the backend for a dashboard that signs users in with
//! Google, connects their Strava account, and serves cached activity data,
//! insights, goals, and an AI coach.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use middleware::RateLimiter;
use models::TrainingInsights;
use services::{
    ActivityFetcher, AiClient, GoogleOidcVerifier, ResponseCache, StravaService,
};
use std::sync::Arc;

/// Shared application state.
///
/// All mutable process state (caches, rate limiter, throttle) lives here as
/// explicit injectable objects built by the composition root, never as
/// module-level globals.
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub strava: StravaService,
    pub fetcher: ActivityFetcher,
    pub rate_limiter: RateLimiter,
    pub ai: AiClient,
    pub google_verifier: Arc<GoogleOidcVerifier>,
    pub insights_cache: ResponseCache<TrainingInsights>,
}
