//! C10: append-only audit trail. Every decision point in the validator,
//! atomic writer and batch aggregator writes exactly one row here; nothing
//! in this crate ever updates or deletes an audit row.

use chrono::Utc;
use serde_json::Value;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::errors::EngineResult;

pub struct AuditLog;

impl AuditLog {
    pub async fn record<'c, E>(
        executor: E,
        actor: &str,
        action: &str,
        resource_type: &str,
        resource_id: Uuid,
        detail: Option<Value>,
    ) -> EngineResult<()>
    where
        E: Executor<'c, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, actor, action, resource_type, resource_id, detail, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(actor)
        .bind(action)
        .bind(resource_type)
        .bind(resource_id)
        .bind(detail)
        .bind(Utc::now())
        .execute(executor)
        .await?;

        Ok(())
    }
}
