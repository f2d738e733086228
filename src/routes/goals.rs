// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Annual goal routes.

use crate::error::{ApiResponse, AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::goal::{Goal, GoalPayload};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::Datelike;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/goals", get(get_goal).post(upsert_goal))
}

#[derive(Deserialize)]
struct GoalQuery {
    year: Option<i32>,
}

/// Get the goal for a year (defaults to the current year).
async fn get_goal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<GoalQuery>,
) -> Result<Json<ApiResponse<Option<Goal>>>> {
    let year = query.year.unwrap_or_else(|| chrono::Utc::now().year());
    let goal = state.store.get_goal(&user.user_id, year).await?;
    Ok(ApiResponse::ok(goal))
}

/// Create or replace the goal for a year.
async fn upsert_goal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<GoalPayload>,
) -> Result<Json<ApiResponse<Goal>>> {
    payload.validate()?;
    if !payload.has_target() {
        return Err(AppError::BadRequest(
            "at least one target must be set".to_string(),
        ));
    }

    let goal = Goal {
        user_id: user.user_id.clone(),
        year: payload.year,
        distance_km: payload.distance_km,
        activity_count: payload.activity_count,
        elevation_m: payload.elevation_m,
        updated_at: format_utc_rfc3339(chrono::Utc::now()),
    };
    state.store.set_goal(&goal).await?;

    // Goal changes shift insight progress immediately.
    state
        .insights_cache
        .remove(&format!("insights:{}", user.user_id));

    tracing::info!(user_id = %user.user_id, year = goal.year, "Goal saved");
    Ok(ApiResponse::ok_with_message(goal, "Goal saved"))
}
