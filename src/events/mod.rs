//! Domain Event Store (C1): the append-only claim-check record carrying
//! the full request payload. Grounded on the teacher's `events/mod.rs`
//! shape (`EngineEvent`/`EventMessage`), generalized from an in-process log
//! line to a persisted, immutable row.

pub mod payload;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

pub use payload::EventPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    VmCreationRequested,
    VmDeletionRequested,
    VmPowerRequested,
    VncAccessRequested,
    BatchCreateRequested,
    BatchDeleteRequested,
    BatchPowerRequested,
    VmCreationCompleted,
    VmCreationFailed,
    VmDeletionCompleted,
    VmDeletionFailed,
    SystemCheckpoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl EventStatus {
    /// The only legal transitions, per spec §4.1:
    /// `PENDING -> PROCESSING -> {COMPLETED|FAILED}` and `PENDING ->
    /// CANCELLED`. Anything else is `InvalidStateTransition`.
    pub fn can_transition_to(&self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (EventStatus::Pending, EventStatus::Processing)
                | (EventStatus::Pending, EventStatus::Cancelled)
                | (EventStatus::Processing, EventStatus::Completed)
                | (EventStatus::Processing, EventStatus::Failed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchChildPayload {
    pub child_event_id: Uuid,
    pub payload: EventPayload,
}

/// Append-only claim-check record. **I-1**: `payload` is immutable once
/// written — enforced here by never exposing a setter for it, and at the
/// storage layer by a database trigger (see `migrations`, out of scope).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DomainEvent {
    pub id: Uuid,
    pub event_type: EventType,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub payload: Vec<u8>,
    pub status: EventStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl DomainEvent {
    pub fn decode_payload(&self) -> serde_json::Result<EventPayload> {
        EventPayload::from_canonical_bytes(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_may_advance_to_processing_or_cancelled() {
        assert!(EventStatus::Pending.can_transition_to(EventStatus::Processing));
        assert!(EventStatus::Pending.can_transition_to(EventStatus::Cancelled));
        assert!(!EventStatus::Pending.can_transition_to(EventStatus::Completed));
        assert!(!EventStatus::Pending.can_transition_to(EventStatus::Failed));
    }

    #[test]
    fn processing_may_only_reach_a_terminal_state() {
        assert!(EventStatus::Processing.can_transition_to(EventStatus::Completed));
        assert!(EventStatus::Processing.can_transition_to(EventStatus::Failed));
        assert!(!EventStatus::Processing.can_transition_to(EventStatus::Pending));
        assert!(!EventStatus::Processing.can_transition_to(EventStatus::Cancelled));
    }

    #[test]
    fn terminal_states_never_transition() {
        for terminal in [EventStatus::Completed, EventStatus::Failed, EventStatus::Cancelled] {
            for next in [
                EventStatus::Pending,
                EventStatus::Processing,
                EventStatus::Completed,
                EventStatus::Failed,
                EventStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }
}
