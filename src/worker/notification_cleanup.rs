//! NotificationCleanup (spec §4.5): scheduled daily, deletes inbox rows
//! older than the configured retention window (≥90 days). Self-schedules
//! its next run by re-enqueueing on completion rather than pulling in a
//! cron crate the teacher doesn't depend on.

use chrono::{Duration as ChronoDuration, Utc};
use sqlx::PgPool;

use crate::errors::EngineResult;
use crate::queue::{JobArgs, JobQueue, NotificationCleanupArgs};
use crate::store::NotificationStore;

pub async fn run(pool: &PgPool, retention_days: i64) -> EngineResult<()> {
    let cutoff = Utc::now() - ChronoDuration::days(retention_days);
    let deleted = NotificationStore::delete_older_than(pool, cutoff).await?;
    tracing::info!(deleted, retention_days, "notification cleanup complete");

    let next_run = Utc::now() + ChronoDuration::days(1);
    JobQueue::enqueue(pool, &JobArgs::NotificationCleanup(NotificationCleanupArgs {}), Some(next_run)).await?;
    Ok(())
}
