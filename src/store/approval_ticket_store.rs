//! C2 persistence: ticket creation plus the serializable, idempotent
//! transitions out of `PENDING` (spec §4.2, P3). Conditional updates gate
//! on rows-affected exactly as the atomic writer does for its own steps;
//! reject/cancel are simple enough not to need the atomic writer's
//! multi-table coupling, but they follow the same discipline.

use chrono::Utc;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::models::{ApprovalTicket, OperationType, TicketStatus};

pub struct ApprovalTicketStore;

const SELECT_COLUMNS: &str = r#"
    id, event_id, operation_type, status, requester, approver, reason, reject_reason,
    selected_cluster_id, selected_template_version, selected_storage_class,
    template_snapshot, instance_size_snapshot, modified_spec, parent_ticket_id, created_at
"#;

impl ApprovalTicketStore {
    pub async fn create<'c, E>(
        executor: E,
        event_id: Uuid,
        operation_type: OperationType,
        requester: &str,
        reason: Option<&str>,
        parent_ticket_id: Option<Uuid>,
    ) -> EngineResult<Uuid>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let id = Uuid::now_v7();
        sqlx::query(
            r#"
            INSERT INTO approval_tickets (id, event_id, operation_type, status, requester, reason, parent_ticket_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(event_id)
        .bind(operation_type)
        .bind(TicketStatus::Pending)
        .bind(requester)
        .bind(reason)
        .bind(parent_ticket_id)
        .bind(Utc::now())
        .execute(executor)
        .await?;

        Ok(id)
    }

    pub async fn get<'c, E>(executor: E, id: Uuid) -> EngineResult<ApprovalTicket>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let query = format!("SELECT {SELECT_COLUMNS} FROM approval_tickets WHERE id = $1");
        sqlx::query_as::<_, ApprovalTicket>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| EngineError::new(ErrorCode::TicketNotFound, format!("ticket {id} not found")))
    }

    /// Looks a ticket up by its 1:1 event, for workers that are only
    /// handed `event_id` by the job queue (spec §4.5).
    pub async fn get_by_event<'c, E>(executor: E, event_id: Uuid) -> EngineResult<ApprovalTicket>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let query = format!("SELECT {SELECT_COLUMNS} FROM approval_tickets WHERE event_id = $1");
        sqlx::query_as::<_, ApprovalTicket>(&query)
            .bind(event_id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| EngineError::new(ErrorCode::TicketNotFound, format!("no ticket for event {event_id}")))
    }

    pub async fn children<'c, E>(executor: E, parent_ticket_id: Uuid) -> EngineResult<Vec<ApprovalTicket>>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let query = format!("SELECT {SELECT_COLUMNS} FROM approval_tickets WHERE parent_ticket_id = $1 ORDER BY created_at");
        Ok(sqlx::query_as::<_, ApprovalTicket>(&query)
            .bind(parent_ticket_id)
            .fetch_all(executor)
            .await?)
    }

    /// `PENDING -> REJECTED`, requires a non-empty `reject_reason` per
    /// spec §4.2. Idempotency: a repeated decision on a non-pending ticket
    /// fails with `TICKET_NOT_PENDING`, reporting the status actually found
    /// (single round trip via `conditional_update_with_status`).
    pub async fn reject<'c, E>(
        executor: E,
        id: Uuid,
        approver: &'c str,
        reject_reason: &'c str,
    ) -> EngineResult<()>
    where
        E: Executor<'c, Database = Postgres>,
    {
        if reject_reason.trim().is_empty() {
            return Err(EngineError::new(ErrorCode::ValidationFailed, "reject_reason must not be empty"));
        }

        let (updated, current) = conditional_update_with_status(
            executor,
            r#"
            WITH attempt AS (
                UPDATE approval_tickets
                SET status = $1, approver = $2, reject_reason = $3
                WHERE id = $4 AND status = $5
                RETURNING id
            )
            SELECT t.status AS status, (SELECT count(*) FROM attempt) AS updated
            FROM approval_tickets t WHERE t.id = $4
            "#,
            |q| {
                q.bind(TicketStatus::Rejected)
                    .bind(approver)
                    .bind(reject_reason)
                    .bind(id)
                    .bind(TicketStatus::Pending)
            },
        )
        .await?;

        if !updated {
            return Err(EngineError::ticket_not_pending(current));
        }
        Ok(())
    }

    /// `PENDING -> CANCELLED`, only permitted when `caller == requester`
    /// (spec §4.2).
    pub async fn cancel<'c, E>(executor: E, id: Uuid, caller: &str, requester: &str) -> EngineResult<()>
    where
        E: Executor<'c, Database = Postgres>,
    {
        if caller != requester {
            return Err(EngineError::new(
                ErrorCode::TicketCancelForbidden,
                "only the requester may cancel this ticket",
            ));
        }

        let (updated, current) = conditional_update_with_status(
            executor,
            r#"
            WITH attempt AS (
                UPDATE approval_tickets SET status = $1 WHERE id = $2 AND status = $3
                RETURNING id
            )
            SELECT t.status AS status, (SELECT count(*) FROM attempt) AS updated
            FROM approval_tickets t WHERE t.id = $2
            "#,
            |q| q.bind(TicketStatus::Cancelled).bind(id).bind(TicketStatus::Pending),
        )
        .await?;

        if !updated {
            return Err(EngineError::ticket_not_pending(current));
        }
        Ok(())
    }

    /// Unconditional status write used by workers moving a ticket through
    /// `APPROVED -> EXECUTING -> {SUCCESS|FAILED}` (spec §4.5). Workers own
    /// their job's ticket exclusively once claimed, so no rows-affected
    /// gate is needed here — the gate lives at approval time.
    pub async fn set_status<'c, E>(executor: E, id: Uuid, status: TicketStatus) -> EngineResult<()>
    where
        E: Executor<'c, Database = Postgres>,
    {
        sqlx::query(r#"UPDATE approval_tickets SET status = $1 WHERE id = $2"#)
            .bind(status)
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Step 1 of `ApproveCreateAndEnqueue` (spec §4.4): `PENDING + CREATE ->
    /// APPROVED`, stamping the admin's cluster/template selection.
    /// Returns `false` without error if the ticket wasn't pending CREATE —
    /// the atomic writer decides whether that's an abort.
    #[allow(clippy::too_many_arguments)]
    pub async fn approve_create<'c, E>(
        executor: E,
        id: Uuid,
        approver: &str,
        cluster_id: Uuid,
        storage_class: Option<&str>,
        template_version: Option<&str>,
        template_snapshot: Option<&serde_json::Value>,
        instance_size_snapshot: Option<&serde_json::Value>,
        modified_spec: Option<&serde_json::Value>,
    ) -> EngineResult<bool>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE approval_tickets
            SET status = $1, approver = $2, selected_cluster_id = $3, selected_storage_class = $4,
                selected_template_version = $5, template_snapshot = $6, instance_size_snapshot = $7,
                modified_spec = $8
            WHERE id = $9 AND status = $10 AND operation_type = $11
            "#,
        )
        .bind(TicketStatus::Approved)
        .bind(approver)
        .bind(cluster_id)
        .bind(storage_class)
        .bind(template_version)
        .bind(template_snapshot)
        .bind(instance_size_snapshot)
        .bind(modified_spec)
        .bind(id)
        .bind(TicketStatus::Pending)
        .bind(OperationType::Create)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Step 1 of `ApproveDeleteAndEnqueue`: `PENDING + DELETE -> APPROVED`.
    pub async fn approve_delete<'c, E>(executor: E, id: Uuid, approver: &str) -> EngineResult<bool>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"UPDATE approval_tickets SET status = $1, approver = $2 WHERE id = $3 AND status = $4 AND operation_type = $5"#,
        )
        .bind(TicketStatus::Approved)
        .bind(approver)
        .bind(id)
        .bind(TicketStatus::Pending)
        .bind(OperationType::Delete)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Batch fan-out dispatch failure (spec §4.6): a child's individual
    /// approve call errored, so it's marked `FAILED` directly with the
    /// truncated error rather than left `PENDING`. Unconditional like
    /// [`Self::set_status`] — the batch aggregator owns this child
    /// exclusively during fan-out.
    pub async fn mark_dispatch_failed<'c, E>(executor: E, id: Uuid, reason: &str) -> EngineResult<()>
    where
        E: Executor<'c, Database = Postgres>,
    {
        sqlx::query(r#"UPDATE approval_tickets SET status = $1, reject_reason = $2 WHERE id = $3"#)
            .bind(TicketStatus::Failed)
            .bind(ApprovalTicket::truncate_reject_reason(reason))
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// VNC approval is terminal for this operation type (spec §4.2): it
    /// goes straight to `APPROVED` with no further worker-driven
    /// transition.
    pub async fn approve_vnc<'c, E>(executor: E, id: Uuid, approver: &str) -> EngineResult<bool>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"UPDATE approval_tickets SET status = $1, approver = $2 WHERE id = $3 AND status = $4 AND operation_type = $5"#,
        )
        .bind(TicketStatus::Approved)
        .bind(approver)
        .bind(id)
        .bind(TicketStatus::Pending)
        .bind(OperationType::VncAccess)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(sqlx::FromRow)]
struct ConditionalUpdateResult {
    status: TicketStatus,
    updated: i64,
}

/// Runs a `WITH attempt AS (UPDATE ... RETURNING id) SELECT status, count(*)`
/// query in one round trip, returning whether the conditional update fired
/// and the ticket's status as currently observed. Used by every rows-
/// affected-gated transition so a failed decision can report `current: X`
/// without a second query (spec §4.2, P3).
async fn conditional_update_with_status<'c, E, F>(
    executor: E,
    sql: &'c str,
    bind: F,
) -> EngineResult<(bool, TicketStatus)>
where
    E: Executor<'c, Database = Postgres>,
    F: FnOnce(
        sqlx::query::QueryAs<'c, Postgres, ConditionalUpdateResult, sqlx::postgres::PgArguments>,
    ) -> sqlx::query::QueryAs<'c, Postgres, ConditionalUpdateResult, sqlx::postgres::PgArguments>,
{
    let query = bind(sqlx::query_as::<_, ConditionalUpdateResult>(sql));
    let row = query
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| EngineError::internal("ticket disappeared during conditional update"))?;

    Ok((row.updated > 0, row.status))
}
