// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! AI coach client.
//!
//! Single call shape: system + user prompt in, text out, against an
//! OpenAI-compatible chat completions endpoint. Without an API key the
//! client runs in mock mode and returns deterministic text, which is what
//! tests and local development use.

use crate::error::AppError;
use crate::models::TrainingInsights;
use serde::Deserialize;
use std::time::Duration;

const AI_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Chat completion client for the coach feature.
#[derive(Clone)]
pub struct AiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl AiClient {
    pub fn new(base_url: String, api_key: Option<String>, model: String) -> Self {
        if api_key.is_none() {
            tracing::warn!("AI_API_KEY not set, coach replies are mocked");
        }
        Self {
            http: reqwest::Client::builder()
                .timeout(AI_REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url,
            api_key,
            model,
        }
    }

    /// Mock-mode client for tests.
    pub fn new_mock() -> Self {
        Self::new(
            "http://localhost:0".to_string(),
            None,
            "mock".to_string(),
        )
    }

    /// Send one system+user prompt pair, return the completion text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, AppError> {
        let Some(api_key) = &self.api_key else {
            return Ok(format!(
                "[coach] Based on your recent training, here's my take: {}",
                user
            ));
        };

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("AI request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Internal(anyhow::anyhow!(
                "AI provider returned status {}",
                status
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("AI response parse error: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("AI response had no choices")))
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

/// Build the coach system prompt from the user's training insights.
pub fn build_coach_prompt(insights: &TrainingInsights) -> String {
    let mut prompt = String::from(
        "You are a supportive endurance coach. Answer questions about the \
         athlete's training using the summary below. Be concrete and brief.\n\n",
    );
    prompt.push_str(&format!(
        "Recent window: {} activities, {:.1} km, {:.1} h moving, {:.0} m climbed.\n",
        insights.total_activities,
        insights.total_distance_km,
        insights.total_moving_time_hours,
        insights.total_elevation_m,
    ));
    for sport in &insights.sports {
        prompt.push_str(&format!(
            "- {}: {} activities, {:.1} km\n",
            sport.sport_type, sport.count, sport.distance_km
        ));
    }
    if let Some(progress) = &insights.goal_progress {
        if let Some(distance) = &progress.distance_km {
            prompt.push_str(&format!(
                "Goal {}: {:.1} of {:.0} km ({:.0}%).\n",
                progress.year,
                distance.current,
                distance.target,
                distance.fraction * 100.0
            ));
        }
    }
    prompt
}
