//! DB-backed half of C12: per-user open-batch counts plus overrides and
//! exemptions. The in-memory cooldown limiter lives in
//! [`crate::rate_limit`].

use sqlx::{Executor, Postgres};

use crate::errors::EngineResult;
use crate::models::{RateLimitExemption, RateLimitOverride};

pub struct RateLimitStore;

impl RateLimitStore {
    pub async fn open_parent_batches<'c, E>(executor: E, user_id: &str) -> EngineResult<i64>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT count(*) FROM batch_approval_tickets b
            JOIN approval_tickets t ON t.id = b.id
            WHERE b.created_by = $1 AND t.status = ANY($2)
            "#,
        )
        .bind(user_id)
        .bind(vec!["PENDING", "APPROVED", "EXECUTING"])
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    pub async fn open_child_tickets<'c, E>(executor: E, user_id: &str) -> EngineResult<i64>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT count(*) FROM approval_tickets
            WHERE requester = $1 AND parent_ticket_id IS NOT NULL AND status = ANY($2)
            "#,
        )
        .bind(user_id)
        .bind(vec!["PENDING", "APPROVED", "EXECUTING"])
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    pub async fn get_override<'c, E>(executor: E, user_id: &str) -> EngineResult<Option<RateLimitOverride>>
    where
        E: Executor<'c, Database = Postgres>,
    {
        Ok(sqlx::query_as::<_, RateLimitOverride>(
            r#"SELECT user_id, max_open_parent_batches, max_open_child_tickets, min_submission_cooldown_secs
               FROM rate_limit_overrides WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?)
    }

    pub async fn get_exemption<'c, E>(executor: E, user_id: &str) -> EngineResult<Option<RateLimitExemption>>
    where
        E: Executor<'c, Database = Postgres>,
    {
        Ok(sqlx::query_as::<_, RateLimitExemption>(
            r#"SELECT user_id, reason FROM rate_limit_exemptions WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?)
    }
}
