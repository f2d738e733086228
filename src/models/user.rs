//! User and linked Strava account models.

use serde::{Deserialize, Serialize};

/// User profile, keyed by the Google subject claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Google OIDC subject (also used as document ID)
    pub user_id: String,
    /// Email address from the Google ID token
    pub email: String,
    /// Display name
    pub name: String,
    /// Profile picture URL
    pub picture: Option<String>,
    /// Linked Strava athlete ID, if connected
    pub strava_athlete_id: Option<u64>,
    /// When the user first signed in (ISO 8601)
    pub created_at: String,
    /// Last sign-in timestamp (ISO 8601)
    pub last_active: String,
}

/// Linked Strava OAuth account for a user.
///
/// Token fields are sealed (AES-256-GCM, base64) when a sealing key is
/// configured; the store treats them as opaque strings either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaAccount {
    /// Strava athlete ID
    pub athlete_id: u64,
    /// Access token (sealed)
    pub access_token: String,
    /// Refresh token (sealed)
    pub refresh_token: String,
    /// When the access token expires (Unix epoch seconds)
    pub expires_at: i64,
    /// Granted OAuth scopes
    pub scopes: Vec<String>,
    /// Athlete first name from the OAuth exchange
    pub firstname: String,
    /// Athlete last name from the OAuth exchange
    pub lastname: String,
}
