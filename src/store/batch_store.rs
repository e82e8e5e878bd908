//! Persistence half of C9: the batch parent projection row. The
//! active/success/failed/cancelled arithmetic itself is
//! [`crate::models::batch::derive_batch_status`], a pure function kept
//! free of the database so the aggregator's tests don't need one.

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::models::batch::{BatchApprovalTicket, BatchCounts, BatchStatus, BatchType};

pub struct BatchStore;

impl BatchStore {
    pub async fn create<'c, E>(
        executor: E,
        id: Uuid,
        batch_type: BatchType,
        created_by: &str,
        reason: Option<&str>,
        request_id: Option<&str>,
        child_count: i32,
    ) -> EngineResult<()>
    where
        E: Executor<'c, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO batch_approval_tickets
                (id, batch_type, child_count, success_count, failed_count, pending_count, status, request_id, created_by, reason)
            VALUES ($1, $2, $3, 0, 0, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(batch_type)
        .bind(child_count)
        .bind(BatchStatus::PendingApproval)
        .bind(request_id)
        .bind(created_by)
        .bind(reason)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn get<'c, E>(executor: E, id: Uuid) -> EngineResult<BatchApprovalTicket>
    where
        E: Executor<'c, Database = Postgres>,
    {
        sqlx::query_as::<_, BatchApprovalTicket>(
            r#"
            SELECT id, batch_type, child_count, success_count, failed_count, pending_count, status, request_id, created_by, reason
            FROM batch_approval_tickets WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| EngineError::new(ErrorCode::TicketNotFound, format!("batch {id} not found")))
    }

    /// Recomputes and writes the parent's projection from its children's
    /// current statuses (spec §4.6), called after every child terminal
    /// transition.
    pub async fn child_counts<'c, E>(executor: E, parent_id: Uuid) -> EngineResult<BatchCounts>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let (active, success, failed, cancelled, total): (i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                count(*) FILTER (WHERE status IN ('PENDING', 'APPROVED', 'EXECUTING')),
                count(*) FILTER (WHERE status = 'SUCCESS'),
                count(*) FILTER (WHERE status IN ('FAILED', 'REJECTED')),
                count(*) FILTER (WHERE status = 'CANCELLED'),
                count(*)
            FROM approval_tickets WHERE parent_ticket_id = $1
            "#,
        )
        .bind(parent_id)
        .fetch_one(executor)
        .await?;

        Ok(BatchCounts {
            active: active as u32,
            success: success as u32,
            failed: failed as u32,
            cancelled: cancelled as u32,
            total: total as u32,
        })
    }

    pub async fn write_projection<'c, E>(
        executor: E,
        parent_id: Uuid,
        status: BatchStatus,
        counts: BatchCounts,
    ) -> EngineResult<()>
    where
        E: Executor<'c, Database = Postgres>,
    {
        sqlx::query(
            r#"UPDATE batch_approval_tickets SET status = $1, success_count = $2, failed_count = $3, pending_count = $4 WHERE id = $5"#,
        )
        .bind(status)
        .bind(counts.success as i32)
        .bind((counts.failed + counts.cancelled) as i32)
        .bind(counts.active as i32)
        .bind(parent_id)
        .execute(executor)
        .await?;
        Ok(())
    }
}
