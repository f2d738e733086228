// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Inbound request rate limiting.
//!
//! Fixed window per identifier (authenticated user id, else client IP):
//! the first request starts the window, the count resets once the window
//! elapses, and requests beyond the maximum are rejected with 429 and a
//! `Retry-After` header. A background sweep drops expired windows so the
//! map stays bounded.
//!
//! The limiter is owned by the application state and injected into the
//! middleware, so tests construct isolated instances.

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// One named window shape per endpoint class.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

/// Endpoint-class limits. Data endpoints allow 60 requests per minute.
pub mod limits {
    use super::RateLimitConfig;
    use std::time::Duration;

    pub const AUTH: RateLimitConfig = RateLimitConfig {
        window: Duration::from_secs(15 * 60),
        max_requests: 10,
    };
    pub const API: RateLimitConfig = RateLimitConfig {
        window: Duration::from_secs(60),
        max_requests: 100,
    };
    pub const DATA: RateLimitConfig = RateLimitConfig {
        window: Duration::from_secs(60),
        max_requests: 60,
    };
    pub const AI: RateLimitConfig = RateLimitConfig {
        window: Duration::from_secs(60),
        max_requests: 10,
    };
}

/// How often expired windows are swept out.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window counter keyed by client identity.
pub struct RateLimiter {
    windows: Arc<DashMap<String, RateLimitWindow>>,
    shutdown_tx: Option<Arc<mpsc::Sender<()>>>,
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        Self {
            windows: self.windows.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }
}

impl RateLimiter {
    /// Limiter without a background sweep (unit tests).
    pub fn new() -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            shutdown_tx: None,
        }
    }

    /// Limiter with a background sweep task.
    pub fn with_sweeper(interval: Duration) -> Self {
        let windows: Arc<DashMap<String, RateLimitWindow>> = Arc::new(DashMap::new());
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let sweep_windows = windows.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        sweep_windows.retain(|_, window| window.reset_at > now);
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            windows,
            shutdown_tx: Some(Arc::new(shutdown_tx)),
        }
    }

    /// Record a request for `identifier` under `config`.
    ///
    /// Returns false when the identifier has exhausted its window.
    pub fn check(&self, identifier: &str, config: &RateLimitConfig) -> bool {
        let now = Instant::now();
        let mut window = self
            .windows
            .entry(identifier.to_string())
            .or_insert(RateLimitWindow {
                count: 0,
                reset_at: now + config.window,
            });

        if now >= window.reset_at {
            window.count = 1;
            window.reset_at = now + config.window;
            return true;
        }

        if window.count < config.max_requests {
            window.count += 1;
            return true;
        }

        false
    }

    /// Seconds until the identifier's window resets (for `Retry-After`).
    pub fn retry_after_secs(&self, identifier: &str) -> u64 {
        self.windows
            .get(identifier)
            .map(|window| {
                window
                    .reset_at
                    .saturating_duration_since(Instant::now())
                    .as_secs()
                    .max(1)
            })
            .unwrap_or(1)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(tx) = &self.shutdown_tx {
            if Arc::strong_count(tx) == 1 {
                let _ = tx.try_send(());
            }
        }
    }
}

/// Middleware applying a named limit to a route group.
///
/// Keyed by the authenticated user when present (the auth layer runs
/// first), otherwise by client IP.
pub async fn rate_limit(
    State((state, config)): State<(Arc<AppState>, RateLimitConfig)>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identifier = request
        .extensions()
        .get::<AuthUser>()
        .map(|user| format!("user:{}", user.user_id))
        .unwrap_or_else(|| format!("ip:{}", client_ip(&request)));

    if !state.rate_limiter.check(&identifier, &config) {
        tracing::warn!(identifier = %identifier, "Inbound rate limit exceeded");
        return Err(AppError::RateLimited {
            retry_after_secs: state.rate_limiter.retry_after_secs(&identifier),
        });
    }

    Ok(next.run(request).await)
}

fn client_ip(request: &Request) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
