use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Append-only decision record (C10). Every approve/reject/cancel/state
/// change writes one row here; rows are never updated or deleted by this
/// crate.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Uuid,
    #[sqlx(json)]
    pub detail: Option<Value>,
    pub created_at: DateTime<Utc>,
}
