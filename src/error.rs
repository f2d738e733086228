// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Application error types with consistent API responses.
//!
//! Every handler failure is funneled through [`AppError`], which renders the
//! uniform JSON envelope `{"success": false, "error", "code", "details"}`.
//! Upstream Strava failures carry enough structure for callers to decide
//! between stale-cache fallback, empty-result degradation, and hard failure.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired session token")]
    InvalidToken,

    #[error("Strava authorization expired, reconnect required")]
    ReauthRequired,

    #[error("Rate limit exceeded")]
    RateLimited {
        /// Seconds until the caller's window resets.
        retry_after_secs: u64,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Strava rate limit hit")]
    StravaRateLimited {
        /// Upstream `Retry-After` hint, when present.
        retry_after_secs: Option<u64>,
    },

    #[error("Strava API error: {0}")]
    StravaApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// A single invalid field in a request payload.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl AppError {
    /// True for errors meaning the stored Strava grant is no longer usable.
    pub fn is_reauth_required(&self) -> bool {
        matches!(self, AppError::ReauthRequired)
    }

    /// True for upstream 429s (eligible for stale-cache degradation).
    pub fn is_upstream_rate_limit(&self) -> bool {
        matches!(self, AppError::StravaRateLimited { .. })
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value for {}", field)),
                })
            })
            .collect();
        AppError::Validation(fields)
    }
}

/// JSON error envelope body.
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error, details) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Authentication required".to_string(),
                None,
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Invalid or expired session token".to_string(),
                None,
            ),
            AppError::ReauthRequired => (
                StatusCode::UNAUTHORIZED,
                "reauth_required",
                "Strava connection expired, please reconnect".to_string(),
                None,
            ),
            AppError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests, slow down".to_string(),
                Some(serde_json::json!({ "retry_after_secs": retry_after_secs })),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None)
            }
            AppError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                "Request validation failed".to_string(),
                serde_json::to_value(fields).ok(),
            ),
            AppError::StravaRateLimited { .. } | AppError::StravaApi(_) => (
                StatusCode::BAD_GATEWAY,
                "strava_error",
                self.to_string(),
                None,
            ),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            success: false,
            error,
            code: Some(code.to_string()),
            details,
        };

        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Success envelope wrapper for API responses.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: None,
        })
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: Some(message.into()),
        })
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
