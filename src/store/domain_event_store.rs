//! C1 persistence. Functions take a generic `Executor` so the atomic writer
//! can run them inside its own open transaction, the same dual-mode shape
//! used throughout `other_examples/*Mvgnu-MCP-Host*`.

use chrono::Utc;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::events::{DomainEvent, EventPayload, EventStatus, EventType};

pub struct DomainEventStore;

impl DomainEventStore {
    /// Appends a new, immutable event row. `payload` is the already
    /// canonically-encoded bytes (see [`EventPayload::to_canonical_bytes`]).
    pub async fn append<'c, E>(
        executor: E,
        event_type: EventType,
        aggregate_type: &str,
        aggregate_id: Uuid,
        payload: &EventPayload,
        created_by: &str,
    ) -> EngineResult<Uuid>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let id = Uuid::now_v7();
        let bytes = payload
            .to_canonical_bytes()
            .map_err(|e| EngineError::internal(format!("payload encoding failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO domain_events (id, event_type, aggregate_type, aggregate_id, payload, status, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(event_type)
        .bind(aggregate_type)
        .bind(aggregate_id)
        .bind(&bytes)
        .bind(EventStatus::Pending)
        .bind(created_by)
        .bind(Utc::now())
        .execute(executor)
        .await?;

        Ok(id)
    }

    pub async fn get<'c, E>(executor: E, id: Uuid) -> EngineResult<DomainEvent>
    where
        E: Executor<'c, Database = Postgres>,
    {
        sqlx::query_as::<_, DomainEvent>(
            r#"
            SELECT id, event_type, aggregate_type, aggregate_id, payload, status, created_by, created_at, archived_at
            FROM domain_events WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| EngineError::new(ErrorCode::EventNotFound, format!("event {id} not found")))
    }

    /// Conditional status transition: only succeeds if the event is
    /// currently `from` and the transition is legal per
    /// [`EventStatus::can_transition_to`]. Returns the number of affected
    /// rows (0 or 1), matching the rows-affected gating pattern used
    /// everywhere else in the atomic writer (spec §4.4, P3).
    pub async fn set_status<'c, E>(
        executor: E,
        id: Uuid,
        from: EventStatus,
        to: EventStatus,
    ) -> EngineResult<u64>
    where
        E: Executor<'c, Database = Postgres>,
    {
        if !from.can_transition_to(to) {
            return Err(EngineError::new(
                ErrorCode::InvalidStateTransition,
                format!("event cannot move from {from} to {to}"),
            ));
        }

        let result = sqlx::query(
            r#"UPDATE domain_events SET status = $1 WHERE id = $2 AND status = $3"#,
        )
        .bind(to)
        .bind(id)
        .bind(from)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}
