use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbox row fanned out to by C11's notification triggers. The actual
/// sender (email/Slack/push) is an external collaborator out of scope for
/// this crate (spec §1); this is only the persisted trigger record.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: String,
    pub kind: String,
    pub message: String,
    pub resource_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}
