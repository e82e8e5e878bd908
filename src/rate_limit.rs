//! Rate-Limit Governor (C12). Consults, in order: exemptions (bypass
//! everything), per-user overrides, then the platform defaults. Caps are on
//! *open* parent/child batches (read from the DB via
//! [`crate::store::RateLimitStore`]); the minimum inter-submission cooldown
//! is enforced in-process with `governor`'s GCRA limiter, the same crate
//! the teacher already depends on.
//!
//! Unlike the stores used by the atomic writer, this governor is consulted
//! *before* a submission is accepted at all (spec §4.7: "the submission is
//! not persisted" on violation), so it takes a pool rather than a generic
//! `Executor` — there is no enclosing transaction to join.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Mutex;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use sqlx::PgPool;

use crate::config::RateLimitDefaults;
use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::store::RateLimitStore;

type UserLimiter = RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

pub enum SubmissionKind {
    ParentBatch,
    Singleton,
}

/// Per-user cooldown limiters, lazily created and owned by the composition
/// root rather than a global static — the same preference the teacher
/// shows for explicit, constructed collaborators over ambient mutable
/// state (spec §9 design note on avoiding global registries).
pub struct RateLimitGovernor {
    defaults: RateLimitDefaults,
    cooldowns: Mutex<HashMap<String, UserLimiter>>,
}

impl RateLimitGovernor {
    pub fn new(defaults: RateLimitDefaults) -> Self {
        RateLimitGovernor { defaults, cooldowns: Mutex::new(HashMap::new()) }
    }

    /// Checks exemptions, open-batch caps, and the submission cooldown, in
    /// that order. On violation, returns `RATE_LIMIT_EXCEEDED` with a
    /// `retry_after_secs` param (the spec's HTTP-429 equivalent).
    pub async fn check(&self, pool: &PgPool, user_id: &str, kind: SubmissionKind) -> EngineResult<()> {
        if RateLimitStore::get_exemption(pool, user_id).await?.is_some() {
            return Ok(());
        }

        let overrides = RateLimitStore::get_override(pool, user_id).await?;

        let max_parents = overrides
            .as_ref()
            .and_then(|o| o.max_open_parent_batches)
            .map(|v| v as i64)
            .unwrap_or(self.defaults.max_open_parent_batches as i64);
        let max_children = overrides
            .as_ref()
            .and_then(|o| o.max_open_child_tickets)
            .map(|v| v as i64)
            .unwrap_or(self.defaults.max_open_child_tickets as i64);
        let cooldown = overrides
            .as_ref()
            .and_then(|o| o.cooldown())
            .unwrap_or(self.defaults.min_submission_cooldown);

        if matches!(kind, SubmissionKind::ParentBatch) {
            let open_parents = RateLimitStore::open_parent_batches(pool, user_id).await?;
            if open_parents >= max_parents {
                return Err(rate_limit_exceeded(cooldown));
            }
        }

        let open_children = RateLimitStore::open_child_tickets(pool, user_id).await?;
        if open_children >= max_children {
            return Err(rate_limit_exceeded(cooldown));
        }

        if !self.cooldown_elapsed(user_id, cooldown) {
            return Err(rate_limit_exceeded(cooldown));
        }

        Ok(())
    }

    fn cooldown_elapsed(&self, user_id: &str, cooldown: Duration) -> bool {
        let mut cooldowns = self.cooldowns.lock().unwrap_or_else(|e| e.into_inner());
        let limiter = cooldowns.entry(user_id.to_string()).or_insert_with(|| {
            let quota =
                Quota::with_period(cooldown).unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1).unwrap()));
            RateLimiter::direct(quota)
        });

        limiter.check().is_ok()
    }
}

fn rate_limit_exceeded(retry_after: Duration) -> EngineError {
    EngineError::new(ErrorCode::RateLimitExceeded, "rate limit exceeded, retry later")
        .with_param("retry_after_secs", retry_after.as_secs().to_string())
}
