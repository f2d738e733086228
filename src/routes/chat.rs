// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! AI coach chat route.

use crate::error::{ApiResponse, AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::services::ai::build_coach_prompt;
use crate::services::fetcher::FetchOptions;
use crate::services::insights::compute_insights;
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

const CHAT_ACTIVITIES_TTL: Duration = Duration::from_secs(5 * 60);
const CHAT_WINDOW: usize = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/ai/chat", post(chat))
}

#[derive(Deserialize, Validate)]
pub struct ChatPayload {
    #[validate(length(min = 1, max = 2000, message = "message must be 1-2000 characters"))]
    pub message: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// Relay a question to the coach with a training-summary system prompt.
async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ChatPayload>,
) -> Result<Json<ApiResponse<ChatResponse>>> {
    payload.validate()?;

    let token = state.strava.get_valid_access_token(&user.user_id).await?;
    let opts = FetchOptions::new(
        format!("activities:{}:0", user.user_id),
        CHAT_ACTIVITIES_TTL,
    );
    let activities = state
        .fetcher
        .fetch_activities(&token, CHAT_WINDOW, &opts)
        .await?;

    let year = chrono::Utc::now().year();
    let goal = state.store.get_goal(&user.user_id, year).await?;
    let insights = compute_insights(&activities, goal.as_ref());

    let system_prompt = build_coach_prompt(&insights);
    let reply = state
        .ai
        .complete(&system_prompt, &payload.message)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user.user_id, error = %e, "Coach completion failed");
            AppError::Internal(anyhow::anyhow!("coach unavailable"))
        })?;

    Ok(ApiResponse::ok(ChatResponse { reply }))
}
