// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current Unix time in seconds.
pub fn epoch_seconds() -> i64 {
    Utc::now().timestamp()
}
