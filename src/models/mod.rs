// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Data models for the application.

pub mod activity;
pub mod goal;
pub mod insights;
pub mod user;

pub use activity::{Activity, ActivityPhoto, StravaActivityDetail, StravaActivitySummary};
pub use goal::Goal;
pub use insights::TrainingInsights;
pub use user::{StravaAccount, User};
