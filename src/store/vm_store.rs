//! C3 persistence: the long-lived VM projection. **I-2**:
//! `(namespace, name)` is globally unique, enforced by a unique index at
//! the schema layer (out of scope per spec §1; migrations aren't part of
//! this crate) and relied upon here.

use chrono::Utc;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::models::{Vm, VmStatus};

pub struct VmStore;

const SELECT_COLUMNS: &str = r#"
    id, name, instance, namespace, cluster_id, status, hostname, created_by, ticket_id, service_id, created_at
"#;

impl VmStore {
    /// Inserts the VM row created at approval time for CREATE tickets
    /// (spec §4.4 step 4). Always starts `CREATING` — see the §9 open
    /// question decision recorded in DESIGN.md.
    pub async fn insert<'c, E>(
        executor: E,
        id: Uuid,
        name: &str,
        instance: &str,
        namespace: &str,
        cluster_id: Uuid,
        created_by: &str,
        ticket_id: Uuid,
        service_id: Uuid,
    ) -> EngineResult<()>
    where
        E: Executor<'c, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO vms (id, name, instance, namespace, cluster_id, status, hostname, created_by, ticket_id, service_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $2, $7, $8, $9, $10)
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(instance)
        .bind(namespace)
        .bind(cluster_id)
        .bind(VmStatus::Creating)
        .bind(created_by)
        .bind(ticket_id)
        .bind(service_id)
        .bind(Utc::now())
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn get<'c, E>(executor: E, id: Uuid) -> EngineResult<Vm>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let query = format!("SELECT {SELECT_COLUMNS} FROM vms WHERE id = $1");
        sqlx::query_as::<_, Vm>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| EngineError::new(ErrorCode::VmNotFound, format!("vm {id} not found")))
    }

    /// Workers are only handed `ticket_id` via the approval ticket they
    /// look up from `event_id` (spec §4.5); this closes the loop back to
    /// the VM row the atomic writer created.
    pub async fn get_by_ticket<'c, E>(executor: E, ticket_id: Uuid) -> EngineResult<Vm>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let query = format!("SELECT {SELECT_COLUMNS} FROM vms WHERE ticket_id = $1");
        sqlx::query_as::<_, Vm>(&query)
            .bind(ticket_id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| EngineError::new(ErrorCode::VmNotFound, format!("no vm for ticket {ticket_id}")))
    }

    pub async fn set_status<'c, E>(executor: E, id: Uuid, status: VmStatus) -> EngineResult<()>
    where
        E: Executor<'c, Database = Postgres>,
    {
        sqlx::query(r#"UPDATE vms SET status = $1 WHERE id = $2"#)
            .bind(status)
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Conditional status write used by the atomic writer's delete path
    /// (spec §4.4): only moves the VM if it is currently in a deletable
    /// state (spec §4.9 state guard).
    pub async fn mark_deleting<'c, E>(executor: E, id: Uuid) -> EngineResult<()>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"UPDATE vms SET status = $1 WHERE id = $2 AND status = ANY($3)"#,
        )
        .bind(VmStatus::Deleting)
        .bind(id)
        .bind(vec![VmStatus::Stopped, VmStatus::Failed])
        .execute(executor)
        .await?;

        if result.rows_affected() != 1 {
            return Err(EngineError::new(ErrorCode::VmNotDeletable, format!("vm {id} is not in a deletable state")));
        }
        Ok(())
    }
}
