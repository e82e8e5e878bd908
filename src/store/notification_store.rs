//! Persistence half of C11. The notification *trigger* interface (fire on
//! approve/reject/state-change) lives in [`crate::notifier`]; this store is
//! only the inbox row it writes and the retention cleanup the
//! `NotificationCleanup` worker runs against it.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::errors::EngineResult;

pub struct NotificationStore;

impl NotificationStore {
    pub async fn insert<'c, E>(
        executor: E,
        recipient: &str,
        kind: &str,
        message: &str,
        resource_id: Option<Uuid>,
    ) -> EngineResult<Uuid>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let id = Uuid::now_v7();
        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient, kind, message, resource_id, created_at, read_at)
            VALUES ($1, $2, $3, $4, $5, $6, NULL)
            "#,
        )
        .bind(id)
        .bind(recipient)
        .bind(kind)
        .bind(message)
        .bind(resource_id)
        .bind(Utc::now())
        .execute(executor)
        .await?;

        Ok(id)
    }

    /// Deletes inbox rows older than `retention_days` (spec §4.5,
    /// `NotificationCleanup`, scheduled daily; retention ≥90 days).
    pub async fn delete_older_than<'c, E>(executor: E, cutoff: DateTime<Utc>) -> EngineResult<u64>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let result = sqlx::query(r#"DELETE FROM notifications WHERE created_at < $1"#)
            .bind(cutoff)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
