use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchType {
    BatchCreate,
    BatchDelete,
    BatchPower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    PendingApproval,
    InProgress,
    Completed,
    PartialSuccess,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct BatchApprovalTicket {
    pub id: Uuid,
    pub batch_type: BatchType,
    pub child_count: i32,
    pub success_count: i32,
    pub failed_count: i32,
    pub pending_count: i32,
    pub status: BatchStatus,
    pub request_id: Option<String>,
    pub created_by: String,
    pub reason: Option<String>,
}

/// Child-state counts used to derive a batch parent's projection, per
/// spec §4.6. Kept as a free function so the aggregator (C9) and its tests
/// can exercise the arithmetic without a database.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchCounts {
    pub active: u32,
    pub success: u32,
    pub failed: u32,
    pub cancelled: u32,
    pub total: u32,
}

pub fn derive_batch_status(counts: BatchCounts) -> BatchStatus {
    if counts.active > 0 {
        return BatchStatus::InProgress;
    }
    if counts.success == counts.total {
        return BatchStatus::Completed;
    }
    if counts.cancelled == counts.total {
        return BatchStatus::Cancelled;
    }
    if counts.success > 0 && (counts.failed + counts.cancelled) > 0 {
        return BatchStatus::PartialSuccess;
    }
    BatchStatus::Failed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_active_is_in_progress() {
        let counts = BatchCounts { active: 2, total: 3, ..Default::default() };
        assert_eq!(derive_batch_status(counts), BatchStatus::InProgress);
    }

    #[test]
    fn all_success_is_completed() {
        let counts = BatchCounts { success: 3, total: 3, ..Default::default() };
        assert_eq!(derive_batch_status(counts), BatchStatus::Completed);
    }

    #[test]
    fn all_cancelled_is_cancelled() {
        let counts = BatchCounts { cancelled: 3, total: 3, ..Default::default() };
        assert_eq!(derive_batch_status(counts), BatchStatus::Cancelled);
    }

    #[test]
    fn mixed_success_and_failure_is_partial_success() {
        // scenario 5 from spec §8: 2 success, 1 failed, 0 pending
        let counts = BatchCounts { success: 2, failed: 1, total: 3, ..Default::default() };
        assert_eq!(derive_batch_status(counts), BatchStatus::PartialSuccess);
    }

    #[test]
    fn all_failed_with_no_success_is_failed() {
        let counts = BatchCounts { failed: 3, total: 3, ..Default::default() };
        assert_eq!(derive_batch_status(counts), BatchStatus::Failed);
    }
}
