// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Authentication routes: Google sign-in, Strava connect OAuth, logout.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ApiResponse, AppError, Result};
use crate::middleware::auth::{create_jwt, AuthUser, SESSION_COOKIE};
use crate::models::User;
use crate::services::OidcError;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// OAuth state entries older than this are rejected.
const OAUTH_STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

/// Routes that work without a session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google", post(google_sign_in))
        .route("/auth/strava/callback", get(strava_callback))
        .route("/auth/logout", get(logout))
}

/// Routes that require a session (connect/disconnect Strava).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/strava", get(strava_connect_start))
        .route("/auth/strava/disconnect", post(strava_disconnect))
}

// ─── Google Sign-In ──────────────────────────────────────────

#[derive(Deserialize)]
pub struct GoogleSignInPayload {
    id_token: String,
}

#[derive(Serialize)]
pub struct SignInResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

/// Verify a Google ID token, upsert the user, and set the session cookie.
async fn google_sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<GoogleSignInPayload>,
) -> Result<(CookieJar, Json<ApiResponse<SignInResponse>>)> {
    let verified = state
        .google_verifier
        .verify_id_token(&payload.id_token)
        .await
        .map_err(|e| match e {
            OidcError::Rejected(msg) => {
                tracing::warn!(error = %msg, "Google sign-in rejected");
                AppError::InvalidToken
            }
            OidcError::Transient(msg) => {
                AppError::Internal(anyhow::anyhow!("OIDC verification unavailable: {}", msg))
            }
        })?;

    let now = format_utc_rfc3339(chrono::Utc::now());
    let user = match state.store.get_user(&verified.subject).await? {
        Some(mut existing) => {
            existing.last_active = now;
            existing.email = verified.email.clone();
            existing.name = verified.name.clone();
            existing.picture = verified.picture.clone();
            existing
        }
        None => User {
            user_id: verified.subject.clone(),
            email: verified.email.clone(),
            name: verified.name.clone(),
            picture: verified.picture.clone(),
            strava_athlete_id: None,
            created_at: now.clone(),
            last_active: now,
        },
    };
    state.store.upsert_user(&user).await?;

    let jwt = create_jwt(&user.user_id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let cookie = Cookie::build((SESSION_COOKIE, jwt))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::days(30))
        .build();

    tracing::info!(user_id = %user.user_id, "User signed in");

    Ok((
        jar.add(cookie),
        ApiResponse::ok(SignInResponse {
            user_id: user.user_id,
            email: user.email,
            name: user.name,
            picture: user.picture,
        }),
    ))
}

/// Clear the session cookie.
async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build();
    (jar.add(cookie), Redirect::temporary("/"))
}

// ─── Strava Connect ──────────────────────────────────────────

/// Query parameters for starting the connect flow.
#[derive(Deserialize)]
pub struct ConnectStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start the Strava OAuth flow - redirect to Strava authorization.
async fn strava_connect_start(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ConnectStartParams>,
    headers: axum::http::HeaderMap,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    // State payload: "user_id|frontend_url|timestamp_hex", HMAC-signed so the
    // callback can trust which user initiated the connect.
    let state_payload = format!("{}|{}|{:x}", user.user_id, frontend_url, timestamp);

    let mut mac = HmacSha256::new_from_slice(&state.config.oauth_state_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(state_payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed_state = format!("{}|{}", state_payload, hex::encode(signature));
    let oauth_state = URL_SAFE_NO_PAD.encode(signed_state.as_bytes());

    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            std::env::var("API_HOST").unwrap_or_else(|_| "localhost:8080".to_string())
        });

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    let callback_url = format!("{}://{}/auth/strava/callback", scheme, host);

    let auth_url = format!(
        "https://www.strava.com/oauth/authorize?\
         client_id={}&\
         redirect_uri={}&\
         response_type=code&\
         scope=activity:read_all,profile:read_all&\
         state={}",
        state.config.strava_client_id,
        urlencoding::encode(&callback_url),
        oauth_state
    );

    tracing::info!(
        user_id = %user.user_id,
        frontend_url = %frontend_url,
        "Starting Strava connect flow"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, link the account.
async fn strava_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let Some((user_id, frontend_url)) =
        verify_and_decode_state(&params.state, &state.config.oauth_state_key)
    else {
        tracing::warn!("Invalid or tampered OAuth state parameter");
        return Err(AppError::BadRequest("invalid state parameter".to_string()));
    };

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        let redirect = format!("{}?strava_error={}", frontend_url, urlencoding::encode(&error));
        return Ok(Redirect::temporary(&redirect));
    }

    let Some(code) = params.code else {
        return Err(AppError::BadRequest("missing authorization code".to_string()));
    };

    let oauth_result = state.strava.handle_oauth_callback(&user_id, &code).await?;

    // Record the athlete link on the user profile.
    if let Some(mut user) = state.store.get_user(&user_id).await? {
        user.strava_athlete_id = Some(oauth_result.athlete_id);
        state.store.upsert_user(&user).await?;
    }

    tracing::info!(
        user_id = %user_id,
        athlete_id = oauth_result.athlete_id,
        "Strava connected"
    );

    Ok(Redirect::temporary(&format!(
        "{}?strava=connected",
        frontend_url
    )))
}

#[derive(Serialize)]
pub struct DisconnectResponse {
    pub disconnected: bool,
}

/// Disconnect Strava: deauthorize upstream and drop stored tokens/caches.
async fn strava_disconnect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<DisconnectResponse>>> {
    state.strava.disconnect(&user.user_id).await?;
    state
        .fetcher
        .invalidate_user(&format!("activities:{}", user.user_id));
    state.insights_cache.remove(&format!("insights:{}", user.user_id));

    if let Some(mut profile) = state.store.get_user(&user.user_id).await? {
        profile.strava_athlete_id = None;
        state.store.upsert_user(&profile).await?;
    }

    tracing::info!(user_id = %user.user_id, "Strava disconnected");
    Ok(ApiResponse::ok(DisconnectResponse { disconnected: true }))
}

/// Verify the HMAC-signed state and decode `(user_id, frontend_url)`.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<(String, String)> {
    let decoded = URL_SAFE_NO_PAD.decode(state).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    // "user_id|frontend_url|timestamp_hex|signature_hex"
    let mut parts = decoded.rsplitn(2, '|');
    let signature_hex = parts.next()?;
    let payload = parts.next()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let signature = hex::decode(signature_hex).ok()?;
    mac.verify_slice(&signature).ok()?;

    let mut fields = payload.splitn(3, '|');
    let user_id = fields.next()?;
    let frontend_url = fields.next()?;
    let timestamp_hex = fields.next()?;

    let timestamp = u128::from_str_radix(timestamp_hex, 16).ok()?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()?
        .as_millis();
    if now.saturating_sub(timestamp) > OAUTH_STATE_MAX_AGE_MS {
        return None;
    }

    Some((user_id.to_string(), frontend_url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_state(user_id: &str, frontend: &str, secret: &[u8]) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis();
        let payload = format!("{}|{}|{:x}", user_id, frontend, timestamp);
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();
        URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, hex::encode(signature)).as_bytes())
    }

    #[test]
    fn test_verify_and_decode_state_success() {
        let secret = b"test_state_key";
        let state = make_state("google-sub-1", "http://localhost:3000", secret);

        let (user_id, frontend) = verify_and_decode_state(&state, secret).unwrap();
        assert_eq!(user_id, "google-sub-1");
        assert_eq!(frontend, "http://localhost:3000");
    }

    #[test]
    fn test_verify_and_decode_state_wrong_secret() {
        let state = make_state("google-sub-1", "http://localhost:3000", b"secret_a");
        assert!(verify_and_decode_state(&state, b"secret_b").is_none());
    }

    #[test]
    fn test_verify_and_decode_state_tampered_payload() {
        let secret = b"test_state_key";
        let state = make_state("google-sub-1", "http://localhost:3000", secret);

        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&state).unwrap()).unwrap();
        let tampered = decoded.replacen("google-sub-1", "google-sub-2", 1);
        let tampered = URL_SAFE_NO_PAD.encode(tampered.as_bytes());

        assert!(verify_and_decode_state(&tampered, secret).is_none());
    }

    #[test]
    fn test_verify_and_decode_state_malformed() {
        assert!(verify_and_decode_state("not-base64!!!", b"secret").is_none());
        assert!(verify_and_decode_state("", b"secret").is_none());
        let garbage = URL_SAFE_NO_PAD.encode(b"no-pipes-here");
        assert!(verify_and_decode_state(&garbage, b"secret").is_none());
    }
}
