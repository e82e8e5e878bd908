//! §4.8 Duplicate Request Guard. Checked before the event/ticket pair is
//! written for CREATE and DELETE singletons.
//!
//! `domain_events.payload` is stored as raw bytea (canonical JSON bytes,
//! see [`EventPayload::to_canonical_bytes`]), not a `jsonb` column, so the
//! comparison can't use Postgres's `->>` JSON operators. Candidate rows are
//! narrowed by requester/operation/status in SQL, then the payload bytes
//! are decoded and compared in Rust.

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::events::payload::EventPayload;

pub struct DuplicateGuard;

impl DuplicateGuard {
    /// DELETE: same requester, same `vm_id`, an existing `PENDING` ticket.
    pub async fn check_delete<'c, E>(executor: E, requester: &str, vm_id: Uuid) -> EngineResult<()>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let candidates: Vec<(Uuid, Vec<u8>)> = sqlx::query_as(
            r#"
            SELECT t.id, e.payload FROM approval_tickets t
            JOIN domain_events e ON e.id = t.event_id
            WHERE t.requester = $1 AND t.operation_type = 'DELETE' AND t.status = 'PENDING'
            "#,
        )
        .bind(requester)
        .fetch_all(executor)
        .await?;

        for (existing_ticket_id, payload_bytes) in candidates {
            let Ok(EventPayload::VmDelete(payload)) = EventPayload::from_canonical_bytes(&payload_bytes) else {
                continue;
            };
            if payload.vm_id == vm_id {
                return Err(EngineError::new(ErrorCode::DuplicateRequest, "a pending delete request already exists for this vm")
                    .with_param("existing_ticket_id", existing_ticket_id.to_string()));
            }
        }
        Ok(())
    }

    /// CREATE: same requester, same `(service_id, template_id,
    /// instance_size_id, namespace)` after trimming the namespace.
    pub async fn check_create<'c, E>(
        executor: E,
        requester: &str,
        service_id: Uuid,
        template_id: Uuid,
        instance_size_id: Uuid,
        namespace: &str,
    ) -> EngineResult<()>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let trimmed = namespace.trim();
        let candidates: Vec<(Uuid, Vec<u8>)> = sqlx::query_as(
            r#"
            SELECT t.id, e.payload FROM approval_tickets t
            JOIN domain_events e ON e.id = t.event_id
            WHERE t.requester = $1 AND t.operation_type = 'CREATE' AND t.status = 'PENDING'
            "#,
        )
        .bind(requester)
        .fetch_all(executor)
        .await?;

        for (existing_ticket_id, payload_bytes) in candidates {
            let Ok(EventPayload::VmCreation(payload)) = EventPayload::from_canonical_bytes(&payload_bytes) else {
                continue;
            };
            if payload.service_id == service_id
                && payload.template_id == template_id
                && payload.instance_size_id == instance_size_id
                && payload.namespace.trim() == trimmed
            {
                return Err(EngineError::new(ErrorCode::DuplicateRequest, "a pending create request already exists for this resource")
                    .with_param("existing_ticket_id", existing_ticket_id.to_string()));
            }
        }
        Ok(())
    }
}
