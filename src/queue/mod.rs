//! Durable Job Queue (C7): a Postgres-backed at-least-once queue. Jobs are
//! claimed with `FOR UPDATE SKIP LOCKED` so multiple worker processes can
//! poll the same table without double-delivery under normal operation;
//! "at-least-once" still holds if a worker dies mid-job (spec §5) — the row
//! stays `running` until its visibility lapses and is reclaimed.
//!
//! `enqueue` takes a generic `Executor` so the atomic writer can insert a
//! job in the same transaction as the ticket/event/VM rows it writes (spec
//! §4.4 P2); everything else here runs against a plain pool from the
//! worker runtime's poll loop.

pub mod jobs;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, PgPool, Postgres};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

pub use jobs::{JobArgs, JobKind, NotificationCleanupArgs, PowerAction, VmCreateArgs, VmDeleteArgs, VmPowerArgs};

use crate::errors::EngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Dead,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    kind: JobKind,
    args: serde_json::Value,
    attempts: i32,
}

/// A job claimed off the queue, ready for a worker to execute.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: Uuid,
    pub args: JobArgs,
    pub attempts: i32,
}

pub struct JobQueue;

/// Default retry ceiling before a job is demoted to `dead` (spec §5).
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

impl JobQueue {
    /// Inserts a queued job, optionally deferred to `run_at`. Runs inside
    /// whatever transaction `executor` belongs to.
    pub async fn enqueue<'c, E>(executor: E, args: &JobArgs, run_at: Option<DateTime<Utc>>) -> EngineResult<Uuid>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let id = Uuid::now_v7();
        let payload = serde_json::to_value(args).map_err(|e| crate::errors::EngineError::internal(format!("job args encoding failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, kind, args, status, attempts, max_attempts, run_at, created_at)
            VALUES ($1, $2, $3, $4, 0, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(args.kind())
        .bind(payload)
        .bind(JobStatus::Queued)
        .bind(DEFAULT_MAX_ATTEMPTS)
        .bind(run_at.unwrap_or_else(Utc::now))
        .bind(Utc::now())
        .execute(executor)
        .await?;

        Ok(id)
    }

    /// Claims the oldest due job whose kind is in `kinds`, if any, locking
    /// its row with `FOR UPDATE SKIP LOCKED` so concurrent pollers never
    /// contend on the same candidate row.
    pub async fn claim_next(pool: &PgPool, kinds: &[JobKind]) -> EngineResult<Option<ClaimedJob>> {
        let mut tx = pool.begin().await?;

        let row: Option<JobRow> = sqlx::query_as(
            r#"
            SELECT id, kind, args, attempts FROM jobs
            WHERE status = $1 AND run_at <= now() AND kind = ANY($2)
            ORDER BY run_at
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#,
        )
        .bind(JobStatus::Queued)
        .bind(kinds)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        sqlx::query(r#"UPDATE jobs SET status = $1, attempts = attempts + 1, locked_at = now() WHERE id = $2"#)
            .bind(JobStatus::Running)
            .bind(row.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let args: JobArgs = serde_json::from_value(row.args)
            .map_err(|e| crate::errors::EngineError::internal(format!("job args decoding failed: {e}")))?;

        Ok(Some(ClaimedJob { id: row.id, args, attempts: row.attempts + 1 }))
    }

    pub async fn complete(pool: &PgPool, id: Uuid) -> EngineResult<()> {
        sqlx::query(r#"UPDATE jobs SET status = $1 WHERE id = $2"#)
            .bind(JobStatus::Completed)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Demotes a failed job back to `queued` with an exponential backoff
    /// delay, unless `attempts` has reached `max_attempts`, in which case
    /// it is marked `dead` and the caller is responsible for moving its
    /// owning ticket/event to a terminal failure state (spec §4.5).
    pub async fn fail(pool: &PgPool, id: Uuid, attempts: i32, error: &str) -> EngineResult<bool> {
        if attempts >= DEFAULT_MAX_ATTEMPTS {
            sqlx::query(r#"UPDATE jobs SET status = $1, last_error = $2 WHERE id = $3"#)
                .bind(JobStatus::Dead)
                .bind(error)
                .bind(id)
                .execute(pool)
                .await?;
            return Ok(false);
        }

        let backoff = ChronoDuration::seconds(backoff_seconds(attempts));
        sqlx::query(r#"UPDATE jobs SET status = $1, last_error = $2, run_at = now() + $3 WHERE id = $4"#)
            .bind(JobStatus::Queued)
            .bind(error)
            .bind(backoff)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(true)
    }
}

/// 2^attempts seconds, capped at 5 minutes.
fn backoff_seconds(attempts: i32) -> i64 {
    let capped = attempts.clamp(0, 8);
    (1i64 << capped).min(300)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(backoff_seconds(0), 1);
        assert_eq!(backoff_seconds(3), 8);
        assert_eq!(backoff_seconds(20), 300);
    }

    /// `DATABASE_URL`-gated integration coverage of the enqueue/claim/
    /// fail/requeue/complete lifecycle (SPEC_FULL.md §F).
    #[tokio::test]
    async fn enqueue_claim_requeue_then_complete() {
        let Some(pool) = crate::test_util::pool().await else { return };

        let args = JobArgs::NotificationCleanup(NotificationCleanupArgs {});
        let id = JobQueue::enqueue(&pool, &args, None).await.unwrap();

        let claimed = JobQueue::claim_next(&pool, &[JobKind::NotificationCleanup]).await.unwrap().unwrap();
        assert_eq!(claimed.id, id);
        assert_eq!(claimed.attempts, 1);
        assert!(JobQueue::claim_next(&pool, &[JobKind::NotificationCleanup]).await.unwrap().is_none(), "job is running, not queued");

        let requeued = JobQueue::fail(&pool, id, claimed.attempts, "boom").await.unwrap();
        assert!(requeued, "first failure should requeue with backoff, not go dead");

        let reclaimed = JobQueue::claim_next(&pool, &[JobKind::NotificationCleanup]).await.unwrap();
        assert!(reclaimed.is_none(), "backoff delay has not elapsed yet");

        JobQueue::complete(&pool, id).await.unwrap();
    }

    #[tokio::test]
    async fn exhausted_attempts_move_a_job_to_dead() {
        let Some(pool) = crate::test_util::pool().await else { return };

        let args = JobArgs::NotificationCleanup(NotificationCleanupArgs {});
        let id = JobQueue::enqueue(&pool, &args, None).await.unwrap();
        JobQueue::claim_next(&pool, &[JobKind::NotificationCleanup]).await.unwrap().unwrap();

        let requeued = JobQueue::fail(&pool, id, DEFAULT_MAX_ATTEMPTS, "exhausted").await.unwrap();
        assert!(!requeued, "exhausted attempts should move the job to dead rather than requeue");
    }
}
