// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Shared test harness: offline app state and a fake Strava upstream.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use stravawesome::config::Config;
use stravawesome::db::Store;
use stravawesome::middleware::RateLimiter;
use stravawesome::models::StravaAccount;
use stravawesome::services::{
    cache::ResponseCache, throttle::RequestThrottle, ActivityFetcher, AiClient,
    GoogleOidcVerifier, StravaClient, StravaService, TokenCipher,
};
use stravawesome::AppState;

/// Fast throttle spacing so tests stay quick.
#[allow(dead_code)]
pub const TEST_THROTTLE_SPACING: std::time::Duration = std::time::Duration::from_millis(10);

/// Create a test app with an in-memory store and mock collaborators.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_upstream("http://127.0.0.1:1")
}

/// Same, but with the Strava client pointed at the given upstream.
#[allow(dead_code)]
pub fn create_test_app_with_upstream(upstream: &str) -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let store = Store::in_memory();
    let cipher = TokenCipher::plaintext();

    let client = StravaClient::with_base_url(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
        upstream,
    );
    let strava = StravaService::new(client.clone(), store.clone(), cipher);
    let fetcher = ActivityFetcher::new(client, RequestThrottle::new(TEST_THROTTLE_SPACING));

    let google_verifier = Arc::new(
        GoogleOidcVerifier::new(&config.google_client_id).expect("verifier"),
    );

    let state = Arc::new(AppState {
        config,
        store,
        strava,
        fetcher,
        rate_limiter: RateLimiter::new(),
        ai: AiClient::new_mock(),
        google_verifier,
        insights_cache: ResponseCache::new(),
    });

    (stravawesome::routes::create_router(state.clone()), state)
}

/// Create a session JWT for tests.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, signing_key: &[u8]) -> String {
    stravawesome::middleware::auth::create_jwt(user_id, signing_key).expect("test jwt")
}

/// Seed a signed-in user.
#[allow(dead_code)]
pub async fn seed_user(store: &Store, user_id: &str) {
    let now = stravawesome::time_utils::format_utc_rfc3339(chrono::Utc::now());
    store
        .upsert_user(&stravawesome::models::User {
            user_id: user_id.to_string(),
            email: format!("{}@example.com", user_id),
            name: "Test User".to_string(),
            picture: None,
            strava_athlete_id: None,
            created_at: now.clone(),
            last_active: now,
        })
        .await
        .expect("seed user");
}

/// Seed a linked Strava account (plaintext cipher in tests).
#[allow(dead_code)]
pub async fn seed_account(store: &Store, user_id: &str, expires_at: i64) {
    store
        .set_account(
            user_id,
            &StravaAccount {
                athlete_id: 4242,
                access_token: "seeded_access_token".to_string(),
                refresh_token: "seeded_refresh_token".to_string(),
                expires_at,
                scopes: vec!["activity:read_all".to_string()],
                firstname: "Test".to_string(),
                lastname: "Athlete".to_string(),
            },
        )
        .await
        .expect("seed account");
}

// ─── Fake Strava upstream ────────────────────────────────────

/// Behavior of the fake activities endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum UpstreamMode {
    Ok,
    RateLimited { retry_after: Option<u64> },
    ServerError,
}

pub struct FakeState {
    pub activities_calls: AtomicU32,
    pub detail_calls: AtomicU32,
    pub photo_calls: AtomicU32,
    pub refresh_calls: AtomicU32,
    pub activities_mode: Mutex<UpstreamMode>,
    /// Detail fetches for these activity IDs fail with 500.
    pub failing_detail_ids: Mutex<HashSet<u64>>,
    /// Refresh grant fails with 400 when set.
    pub refresh_fails: Mutex<bool>,
    /// Number of activities the list endpoint returns.
    pub activity_count: AtomicU32,
}

impl FakeState {
    fn new() -> Self {
        Self {
            activities_calls: AtomicU32::new(0),
            detail_calls: AtomicU32::new(0),
            photo_calls: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
            activities_mode: Mutex::new(UpstreamMode::Ok),
            failing_detail_ids: Mutex::new(HashSet::new()),
            refresh_fails: Mutex::new(false),
            activity_count: AtomicU32::new(3),
        }
    }

    #[allow(dead_code)]
    pub fn set_mode(&self, mode: UpstreamMode) {
        *self.activities_mode.lock().unwrap() = mode;
    }

    #[allow(dead_code)]
    pub fn fail_details_for(&self, id: u64) {
        self.failing_detail_ids.lock().unwrap().insert(id);
    }

    #[allow(dead_code)]
    pub fn set_refresh_fails(&self, fails: bool) {
        *self.refresh_fails.lock().unwrap() = fails;
    }
}

pub struct FakeStrava {
    pub base_url: String,
    pub state: Arc<FakeState>,
}

fn summary_json(id: u64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": format!("Activity {}", id),
        "sport_type": "Ride",
        "start_date": "2026-05-01T07:00:00Z",
        "distance": 25000.0,
        "moving_time": 3600,
        "total_elevation_gain": 250.0,
    })
}

async fn fake_activities(State(state): State<Arc<FakeState>>) -> axum::response::Response {
    state.activities_calls.fetch_add(1, Ordering::SeqCst);
    let mode = *state.activities_mode.lock().unwrap();
    match mode {
        UpstreamMode::Ok => {
            let count = state.activity_count.load(Ordering::SeqCst) as u64;
            let list: Vec<_> = (1..=count).map(summary_json).collect();
            Json(list).into_response()
        }
        UpstreamMode::RateLimited { retry_after } => {
            let mut headers = HeaderMap::new();
            if let Some(secs) = retry_after {
                headers.insert("retry-after", secs.to_string().parse().unwrap());
            }
            (StatusCode::TOO_MANY_REQUESTS, headers, "rate limited").into_response()
        }
        UpstreamMode::ServerError => {
            (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
        }
    }
}

async fn fake_activity_detail(
    State(state): State<Arc<FakeState>>,
    Path(id): Path<u64>,
) -> axum::response::Response {
    state.detail_calls.fetch_add(1, Ordering::SeqCst);
    if state.failing_detail_ids.lock().unwrap().contains(&id) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "detail down").into_response();
    }
    Json(serde_json::json!({
        "id": id,
        "name": format!("Activity {}", id),
        "sport_type": "Ride",
        "start_date": "2026-05-01T07:00:00Z",
        "distance": 25000.0,
        "moving_time": 3600,
        "total_elevation_gain": 250.0,
        "device_name": "Garmin Edge 530",
        "start_latlng": [37.4, -122.1],
        "end_latlng": [37.5, -122.2],
        "map": { "polyline": "_p~iF~ps|U_ulLnnqC", "summary_polyline": null },
    }))
    .into_response()
}

async fn fake_photos(
    State(state): State<Arc<FakeState>>,
    Path(id): Path<u64>,
) -> axum::response::Response {
    state.photo_calls.fetch_add(1, Ordering::SeqCst);
    Json(serde_json::json!([
        {
            "unique_id": format!("photo-{}", id),
            "activity_id": id,
            "urls": { "600": format!("https://photos.example/{}.jpg", id) },
        }
    ]))
    .into_response()
}

async fn fake_token(
    State(state): State<Arc<FakeState>>,
    body: String,
) -> axum::response::Response {
    if body.contains("grant_type=refresh_token") {
        state.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if *state.refresh_fails.lock().unwrap() {
            return (StatusCode::BAD_REQUEST, r#"{"message":"invalid_grant"}"#).into_response();
        }
        let n = state.refresh_calls.load(Ordering::SeqCst);
        return Json(serde_json::json!({
            "access_token": format!("refreshed_access_{}", n),
            "refresh_token": format!("refreshed_refresh_{}", n),
            "expires_at": chrono::Utc::now().timestamp() + 6 * 3600,
        }))
        .into_response();
    }

    // Authorization code exchange
    Json(serde_json::json!({
        "access_token": "exchanged_access",
        "refresh_token": "exchanged_refresh",
        "expires_at": chrono::Utc::now().timestamp() + 6 * 3600,
        "athlete": {
            "id": 4242,
            "firstname": "Test",
            "lastname": "Athlete",
            "profile": null,
        },
    }))
    .into_response()
}

/// Spawn a fake Strava server on an ephemeral port.
#[allow(dead_code)]
pub async fn spawn_fake_strava() -> FakeStrava {
    let state = Arc::new(FakeState::new());

    let app = Router::new()
        .route("/api/v3/athlete/activities", get(fake_activities))
        .route("/api/v3/activities/{id}", get(fake_activity_detail))
        .route("/api/v3/activities/{id}/photos", get(fake_photos))
        .route("/oauth/token", post(fake_token))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake strava");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake strava serve");
    });

    FakeStrava {
        base_url: format!("http://{}", addr),
        state,
    }
}
