// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Strava API client and token lifecycle management.
//!
//! Handles:
//! - Activity list / detail / photo fetching
//! - OAuth code exchange and deauthorization
//! - Token refresh when expired, single-flight per user
//! - Rate limit detection with `Retry-After` extraction

use crate::error::AppError;
use crate::models::{ActivityPhoto, StravaActivityDetail, StravaActivitySummary};
use serde::Deserialize;

const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";
const STRAVA_OAUTH_BASE: &str = "https://www.strava.com/oauth";

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: STRAVA_API_BASE.to_string(),
            oauth_base: STRAVA_OAUTH_BASE.to_string(),
            client_id,
            client_secret,
        }
    }

    /// Point the client at a different upstream (tests).
    pub fn with_base_url(client_id: String, client_secret: String, base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: format!("{}/api/v3", base),
            oauth_base: format!("{}/oauth", base),
            client_id,
            client_secret,
        }
    }

    /// List activities, newest first.
    pub async fn list_activities(
        &self,
        access_token: &str,
        per_page: u32,
        after: Option<i64>,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let url = format!("{}/athlete/activities", self.api_base);

        let mut query = vec![("per_page", per_page.to_string())];
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Get a detailed activity by ID.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivityDetail, AppError> {
        let url = format!("{}/activities/{}", self.api_base, activity_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Get photos attached to an activity.
    pub async fn get_activity_photos(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<Vec<ActivityPhoto>, AppError> {
        let url = format!("{}/activities/{}/photos", self.api_base, activity_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("size", "600")])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token exchange failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Deauthorize the application for a user.
    ///
    /// This invalidates all access and refresh tokens for the user
    /// and removes the app from their Strava settings.
    pub async fn deauthorize(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/deauthorize", self.oauth_base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Deauthorization request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::StravaApi(format!(
                "Deauthorization failed with status {}",
                status
            )));
        }
        tracing::info!("Strava deauthorization successful");
        Ok(())
    }

    /// Check response status and parse the JSON body.
    ///
    /// 429 carries the upstream `Retry-After` hint; 401 means the grant is
    /// no longer usable and the user must reconnect.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                tracing::warn!(?retry_after_secs, "Strava rate limit hit (429)");
                return Err(AppError::StravaRateLimited { retry_after_secs });
            }

            if status.as_u16() == 401 {
                return Err(AppError::ReauthRequired);
            }

            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    pub firstname: String,
    pub lastname: String,
    pub profile: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - token lifecycle on top of the client
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::Store;
use crate::models::StravaAccount;
use crate::services::cache::KeyedLocks;
use crate::services::crypto::TokenCipher;
use dashmap::DashMap;
use std::sync::Arc;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Cached plaintext access token with expiry information.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Shared token cache type for use in AppState.
pub type TokenCache = Arc<DashMap<String, CachedToken>>;

/// High-level Strava service that manages token lifecycle and API calls.
///
/// This service encapsulates:
/// - Account retrieval and token unsealing from the store
/// - Automatic token refresh when expiring (with 5-minute margin)
/// - Re-sealing and storage of refreshed tokens
/// - In-memory token caching to skip store reads on the hot path
/// - Per-user locking so concurrent callers perform at most one refresh
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    store: Store,
    cipher: TokenCipher,
    token_cache: TokenCache,
    refresh_locks: KeyedLocks,
}

impl StravaService {
    pub fn new(client: StravaClient, store: Store, cipher: TokenCipher) -> Self {
        Self {
            client,
            store,
            cipher,
            token_cache: Arc::new(DashMap::new()),
            refresh_locks: KeyedLocks::new(),
        }
    }

    /// Get a valid (non-expired) access token for the given user.
    ///
    /// Fast path is the in-memory cache. On expiry, the per-user lock
    /// serializes the refresh; late arrivals re-check the cache after the
    /// winner populates it, so two concurrent callers trigger one upstream
    /// refresh and both receive the refreshed token. A refresh failure is
    /// terminal for the request: the caller must treat it as
    /// "reconnect Strava".
    pub async fn get_valid_access_token(&self, user_id: &str) -> Result<String, AppError> {
        let now = crate::time_utils::epoch_seconds();

        // Fast path: cached and not expiring soon.
        if let Some(cached) = self.token_cache.get(user_id) {
            if now + TOKEN_REFRESH_MARGIN_SECS < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        // Serialize refreshes for this user.
        let lock = self.refresh_locks.for_key(user_id);
        let _guard = lock.lock().await;

        // Re-check after acquiring the lock; another task may have refreshed.
        if let Some(cached) = self.token_cache.get(user_id) {
            if now + TOKEN_REFRESH_MARGIN_SECS < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        let account = self
            .store
            .get_account(user_id)
            .await?
            .ok_or(AppError::ReauthRequired)?;

        if account.access_token.is_empty() {
            return Err(AppError::ReauthRequired);
        }

        let access_token = self.cipher.open(&account.access_token)?;

        if now + TOKEN_REFRESH_MARGIN_SECS < account.expires_at {
            // Still valid, cache and return.
            self.token_cache.insert(
                user_id.to_string(),
                CachedToken {
                    access_token: access_token.clone(),
                    expires_at: account.expires_at,
                },
            );
            return Ok(access_token);
        }

        tracing::info!(user_id, "Access token expired, refreshing");

        let refresh_token = self.cipher.open(&account.refresh_token)?;

        // One refresh attempt; a failure means the grant is gone and the
        // user has to reconnect. No retry here.
        let new_tokens = match self.client.refresh_token(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Token refresh failed");
                return Err(AppError::ReauthRequired);
            }
        };

        let updated = StravaAccount {
            access_token: self.cipher.seal(&new_tokens.access_token)?,
            refresh_token: self.cipher.seal(&new_tokens.refresh_token)?,
            expires_at: new_tokens.expires_at,
            ..account
        };
        self.store.set_account(user_id, &updated).await?;

        self.token_cache.insert(
            user_id.to_string(),
            CachedToken {
                access_token: new_tokens.access_token.clone(),
                expires_at: new_tokens.expires_at,
            },
        );

        tracing::info!(user_id, "Token refreshed and cached");
        Ok(new_tokens.access_token)
    }

    /// Handle the OAuth callback: exchange the code, seal and store tokens.
    pub async fn handle_oauth_callback(
        &self,
        user_id: &str,
        code: &str,
    ) -> Result<OAuthResult, AppError> {
        let exchange = self.client.exchange_code(code).await?;

        let account = StravaAccount {
            athlete_id: exchange.athlete.id,
            access_token: self.cipher.seal(&exchange.access_token)?,
            refresh_token: self.cipher.seal(&exchange.refresh_token)?,
            expires_at: exchange.expires_at,
            scopes: vec![
                "activity:read_all".to_string(),
                "profile:read_all".to_string(),
            ],
            firstname: exchange.athlete.firstname.clone(),
            lastname: exchange.athlete.lastname.clone(),
        };
        self.store.set_account(user_id, &account).await?;

        self.token_cache.insert(
            user_id.to_string(),
            CachedToken {
                access_token: exchange.access_token,
                expires_at: exchange.expires_at,
            },
        );

        tracing::info!(
            user_id,
            athlete_id = exchange.athlete.id,
            firstname = %exchange.athlete.firstname,
            "Strava connected, tokens stored"
        );

        Ok(OAuthResult {
            athlete_id: exchange.athlete.id,
            firstname: exchange.athlete.firstname,
            lastname: exchange.athlete.lastname,
        })
    }

    /// Disconnect Strava: deauthorize upstream (best effort), then delete
    /// the stored account and drop the cached token.
    pub async fn disconnect(&self, user_id: &str) -> Result<(), AppError> {
        if let Some(account) = self.store.get_account(user_id).await? {
            match self.cipher.open(&account.access_token) {
                Ok(access_token) => {
                    if let Err(e) = self.client.deauthorize(&access_token).await {
                        tracing::warn!(user_id, error = %e, "Deauthorization failed, deleting locally anyway");
                    }
                }
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Could not unseal token for deauthorization");
                }
            }
        }

        self.store.delete_account(user_id).await?;
        self.token_cache.remove(user_id);
        Ok(())
    }
}

/// Result of handling the Strava OAuth callback.
#[derive(Debug, Clone)]
pub struct OAuthResult {
    pub athlete_id: u64,
    pub firstname: String,
    pub lastname: String,
}
