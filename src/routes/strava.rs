// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Data routes: profile, activities, insights, heatmap, photos.

use crate::error::{ApiResponse, AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::insights::HeatmapPoint;
use crate::models::{Activity, ActivityPhoto, TrainingInsights};
use crate::services::fetcher::FetchOptions;
use crate::services::insights::{compute_insights, heatmap_points, MAX_HEATMAP_POINTS};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// TTL for cached activity lists.
const ACTIVITIES_TTL: Duration = Duration::from_secs(5 * 60);

/// TTL for computed insights.
const INSIGHTS_TTL: Duration = Duration::from_secs(10 * 60);

/// How many recent activities feed insights and the heatmap.
const INSIGHTS_WINDOW: usize = 100;
const HEATMAP_WINDOW: usize = 50;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/strava/activities", get(get_activities))
        .route("/api/strava/insights", get(get_insights))
        .route("/api/strava/heatmap", get(get_heatmap))
        .route("/api/strava/photos", get(get_photos))
}

fn activities_cache_key(user_id: &str, after: Option<i64>) -> String {
    format!("activities:{}:{}", user_id, after.unwrap_or(0))
}

// ─── Profile ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub strava_connected: bool,
    pub strava_athlete_id: Option<u64>,
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<MeResponse>>> {
    let profile = state
        .store
        .get_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    Ok(ApiResponse::ok(MeResponse {
        user_id: profile.user_id,
        email: profile.email,
        name: profile.name,
        picture: profile.picture,
        strava_connected: profile.strava_athlete_id.is_some(),
        strava_athlete_id: profile.strava_athlete_id,
    }))
}

// ─── Activities ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ActivitiesQuery {
    /// Page size hint (also the cache sufficiency size)
    #[serde(default = "default_per_page")]
    per_page: usize,
    /// Only activities after this Unix timestamp
    after: Option<i64>,
    /// Enrich with geographic detail fields
    #[serde(default)]
    detailed: bool,
}

fn default_per_page() -> usize {
    30
}

async fn get_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ActivitiesQuery>,
) -> Result<Json<ApiResponse<Vec<Activity>>>> {
    if query.per_page == 0 || query.per_page > 200 {
        return Err(AppError::BadRequest(
            "per_page must be between 1 and 200".to_string(),
        ));
    }

    let token = state.strava.get_valid_access_token(&user.user_id).await?;
    let opts = FetchOptions::new(
        activities_cache_key(&user.user_id, query.after),
        ACTIVITIES_TTL,
    )
    .after(query.after);

    let activities = if query.detailed {
        state
            .fetcher
            .fetch_activities_with_details(&token, query.per_page, &opts)
            .await?
    } else {
        state
            .fetcher
            .fetch_activities(&token, query.per_page, &opts)
            .await?
            .into_iter()
            .map(Activity::from_summary)
            .collect()
    };

    Ok(ApiResponse::ok(activities))
}

// ─── Insights ────────────────────────────────────────────────

async fn get_insights(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<TrainingInsights>>> {
    let cache_key = format!("insights:{}", user.user_id);
    if let Some(cached) = state.insights_cache.get(&cache_key, 0) {
        return Ok(ApiResponse::ok(cached));
    }

    let token = state.strava.get_valid_access_token(&user.user_id).await?;
    let opts = FetchOptions::new(activities_cache_key(&user.user_id, None), ACTIVITIES_TTL);
    let activities = state
        .fetcher
        .fetch_activities(&token, INSIGHTS_WINDOW, &opts)
        .await?;

    let year = chrono::Utc::now().year();
    let goal = state.store.get_goal(&user.user_id, year).await?;

    let insights = compute_insights(&activities, goal.as_ref());
    state
        .insights_cache
        .insert(cache_key, insights.clone(), INSIGHTS_TTL, 0);

    Ok(ApiResponse::ok(insights))
}

// ─── Heatmap ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HeatmapResponse {
    pub points: Vec<HeatmapPoint>,
}

async fn get_heatmap(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<HeatmapResponse>>> {
    let token = state.strava.get_valid_access_token(&user.user_id).await?;
    let opts = FetchOptions::new(activities_cache_key(&user.user_id, None), ACTIVITIES_TTL);

    let activities = state
        .fetcher
        .fetch_activities_with_details(&token, HEATMAP_WINDOW, &opts)
        .await?;

    let points = heatmap_points(&activities, MAX_HEATMAP_POINTS);
    Ok(ApiResponse::ok(HeatmapResponse { points }))
}

// ─── Photos ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct PhotosQuery {
    activity_id: u64,
}

async fn get_photos(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PhotosQuery>,
) -> Result<Json<ApiResponse<Vec<ActivityPhoto>>>> {
    let token = state.strava.get_valid_access_token(&user.user_id).await?;
    let photos = state
        .fetcher
        .fetch_activity_photos(&token, query.activity_id)
        .await?;
    Ok(ApiResponse::ok(photos))
}
