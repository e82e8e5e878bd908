use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Create,
    Delete,
    VncAccess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Executing,
    Success,
    Failed,
}

impl TicketStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TicketStatus::Rejected | TicketStatus::Cancelled | TicketStatus::Success | TicketStatus::Failed
        )
    }

    /// §4.6 P7: active states count toward a batch parent's pending bucket.
    pub fn is_active(&self) -> bool {
        matches!(self, TicketStatus::Pending | TicketStatus::Approved | TicketStatus::Executing)
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ApprovalTicket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub operation_type: OperationType,
    pub status: TicketStatus,
    pub requester: String,
    pub approver: Option<String>,
    pub reason: Option<String>,
    pub reject_reason: Option<String>,
    pub selected_cluster_id: Option<Uuid>,
    pub selected_template_version: Option<String>,
    pub selected_storage_class: Option<String>,
    #[sqlx(json)]
    pub template_snapshot: Option<Value>,
    #[sqlx(json)]
    pub instance_size_snapshot: Option<Value>,
    #[sqlx(json)]
    pub modified_spec: Option<Value>,
    pub parent_ticket_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalTicket {
    /// Truncates an error message for batch child dispatch failures, per
    /// spec §4.6: failures are recorded but never abort the batch, and the
    /// stored text is capped at 512 characters.
    pub fn truncate_reject_reason(reason: &str) -> String {
        const MAX: usize = 512;
        if reason.chars().count() <= MAX {
            reason.to_string()
        } else {
            reason.chars().take(MAX).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_caps_at_512_chars() {
        let long = "x".repeat(1000);
        let truncated = ApprovalTicket::truncate_reject_reason(&long);
        assert_eq!(truncated.chars().count(), 512);
    }

    #[test]
    fn short_reason_is_unchanged() {
        assert_eq!(ApprovalTicket::truncate_reject_reason("bad size id"), "bad size id");
    }

    #[test]
    fn active_states_match_spec_definition() {
        assert!(TicketStatus::Pending.is_active());
        assert!(TicketStatus::Approved.is_active());
        assert!(TicketStatus::Executing.is_active());
        assert!(!TicketStatus::Success.is_active());
        assert!(!TicketStatus::Failed.is_active());
        assert!(!TicketStatus::Rejected.is_active());
        assert!(!TicketStatus::Cancelled.is_active());
    }
}
