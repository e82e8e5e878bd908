use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-user cap override (C12). A present field replaces the platform
/// default for that user; `None` fields fall back to
/// [`crate::config::RateLimitDefaults`].
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct RateLimitOverride {
    pub user_id: String,
    pub max_open_parent_batches: Option<i32>,
    pub max_open_child_tickets: Option<i32>,
    pub min_submission_cooldown_secs: Option<i32>,
}

impl RateLimitOverride {
    pub fn cooldown(&self) -> Option<Duration> {
        self.min_submission_cooldown_secs.map(|s| Duration::from_secs(s.max(0) as u64))
    }
}

/// A user listed here bypasses all caps and cooldowns.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct RateLimitExemption {
    pub user_id: String,
    pub reason: String,
}
