// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Datastore wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile storage)
//! - Strava accounts (sealed OAuth tokens, one record per user)
//! - Goals (one record per user per year)
//!
//! The production backend is Firestore; tests and local development use an
//! in-memory backend with the same surface. The core logic only ever sees
//! "read one record", "write one record", so swapping the backing store does
//! not touch call sites.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Goal, StravaAccount, User};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Clone)]
enum Backend {
    Firestore(firestore::FirestoreDb),
    Memory(Arc<MemoryStore>),
}

#[derive(Default)]
struct MemoryStore {
    users: DashMap<String, User>,
    accounts: DashMap<String, StravaAccount>,
    goals: DashMap<String, Goal>,
}

/// Datastore client.
#[derive(Clone)]
pub struct Store {
    backend: Backend,
}

impl Store {
    /// Connect to Firestore.
    ///
    /// For local development with the emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn connect(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use an unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::connect_emulator(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Connect to the Firestore emulator with unauthenticated access.
    async fn connect_emulator(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // ExternalJwtFunctionSource provides a dummy token without needing a
        // custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create an in-memory store (tests and local dev without GCP).
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(MemoryStore::default())),
        }
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by their Google subject ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => client
                .fluent()
                .select()
                .by_id_in(collections::USERS)
                .obj()
                .one(user_id)
                .await
                .map_err(|e| AppError::Database(e.to_string())),
            Backend::Memory(mem) => Ok(mem.users.get(user_id).map(|u| u.clone())),
        }
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::USERS)
                    .document_id(user.user_id.clone())
                    .object(user)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
            Backend::Memory(mem) => {
                mem.users.insert(user.user_id.clone(), user.clone());
                Ok(())
            }
        }
    }

    // ─── Strava Account Operations ───────────────────────────────

    /// Get the linked Strava account for a user.
    pub async fn get_account(&self, user_id: &str) -> Result<Option<StravaAccount>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => client
                .fluent()
                .select()
                .by_id_in(collections::STRAVA_ACCOUNTS)
                .obj()
                .one(user_id)
                .await
                .map_err(|e| AppError::Database(e.to_string())),
            Backend::Memory(mem) => Ok(mem.accounts.get(user_id).map(|a| a.clone())),
        }
    }

    /// Store the linked Strava account for a user.
    pub async fn set_account(
        &self,
        user_id: &str,
        account: &StravaAccount,
    ) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::STRAVA_ACCOUNTS)
                    .document_id(user_id.to_string())
                    .object(account)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
            Backend::Memory(mem) => {
                mem.accounts.insert(user_id.to_string(), account.clone());
                Ok(())
            }
        }
    }

    /// Delete the linked Strava account (disconnect).
    pub async fn delete_account(&self, user_id: &str) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                client
                    .fluent()
                    .delete()
                    .from(collections::STRAVA_ACCOUNTS)
                    .document_id(user_id.to_string())
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
            Backend::Memory(mem) => {
                mem.accounts.remove(user_id);
                Ok(())
            }
        }
    }

    // ─── Goal Operations ─────────────────────────────────────────

    fn goal_doc_id(user_id: &str, year: i32) -> String {
        format!("{}_{}", user_id, year)
    }

    /// Get a user's goal for a specific year.
    pub async fn get_goal(&self, user_id: &str, year: i32) -> Result<Option<Goal>, AppError> {
        let doc_id = Self::goal_doc_id(user_id, year);
        match &self.backend {
            Backend::Firestore(client) => client
                .fluent()
                .select()
                .by_id_in(collections::GOALS)
                .obj()
                .one(&doc_id)
                .await
                .map_err(|e| AppError::Database(e.to_string())),
            Backend::Memory(mem) => Ok(mem.goals.get(&doc_id).map(|g| g.clone())),
        }
    }

    /// Create or replace a user's goal for a year.
    pub async fn set_goal(&self, goal: &Goal) -> Result<(), AppError> {
        let doc_id = Self::goal_doc_id(&goal.user_id, goal.year);
        match &self.backend {
            Backend::Firestore(client) => {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::GOALS)
                    .document_id(doc_id.clone())
                    .object(goal)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
            Backend::Memory(mem) => {
                mem.goals.insert(doc_id, goal.clone());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_utils::format_utc_rfc3339;

    fn test_user(id: &str) -> User {
        User {
            user_id: id.to_string(),
            email: format!("{}@example.com", id),
            name: "Test User".to_string(),
            picture: None,
            strava_athlete_id: None,
            created_at: format_utc_rfc3339(chrono::Utc::now()),
            last_active: format_utc_rfc3339(chrono::Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_memory_user_roundtrip() {
        let store = Store::in_memory();
        assert!(store.get_user("u1").await.unwrap().is_none());

        store.upsert_user(&test_user("u1")).await.unwrap();
        let loaded = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(loaded.email, "u1@example.com");
    }

    #[tokio::test]
    async fn test_memory_account_delete() {
        let store = Store::in_memory();
        let account = StravaAccount {
            athlete_id: 7,
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expires_at: 0,
            scopes: vec!["activity:read_all".to_string()],
            firstname: "A".to_string(),
            lastname: "B".to_string(),
        };
        store.set_account("u1", &account).await.unwrap();
        assert!(store.get_account("u1").await.unwrap().is_some());

        store.delete_account("u1").await.unwrap();
        assert!(store.get_account("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_goal_keyed_by_user_and_year() {
        let store = Store::in_memory();
        let goal = Goal {
            user_id: "u1".to_string(),
            year: 2026,
            distance_km: Some(1000.0),
            activity_count: None,
            elevation_m: None,
            updated_at: format_utc_rfc3339(chrono::Utc::now()),
        };
        store.set_goal(&goal).await.unwrap();

        assert!(store.get_goal("u1", 2026).await.unwrap().is_some());
        assert!(store.get_goal("u1", 2025).await.unwrap().is_none());
        assert!(store.get_goal("u2", 2026).await.unwrap().is_none());
    }
}
