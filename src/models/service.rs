use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Top-level logical grouping owning one or more [`Service`]s.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct System {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Owns VMs and the monotonic per-service instance index (C4).
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub system_id: Uuid,
    pub name: String,
    pub next_instance_index: i64,
    pub created_at: DateTime<Utc>,
}
