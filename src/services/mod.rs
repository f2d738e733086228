// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Services module - business logic layer.

pub mod ai;
pub mod cache;
pub mod crypto;
pub mod fetcher;
pub mod google_oidc;
pub mod insights;
pub mod retry;
pub mod strava;
pub mod throttle;

pub use ai::AiClient;
pub use cache::{KeyedLocks, ResponseCache};
pub use crypto::TokenCipher;
pub use fetcher::{ActivityFetcher, FetchOptions};
pub use google_oidc::{GoogleOidcVerifier, OidcError, VerifiedGoogleUser};
pub use retry::RetryPolicy;
pub use strava::{OAuthResult, StravaClient, StravaService};
pub use throttle::RequestThrottle;
