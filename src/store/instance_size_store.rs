//! Read-only lookup backing the approval validator (C5, spec §4.3 rules 3
//! and 4). Instance size catalog rows are provisioned out of scope for
//! this crate (spec §1); this store only ever reads them.

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::models::InstanceSize;

pub struct InstanceSizeStore;

impl InstanceSizeStore {
    pub async fn get<'c, E>(executor: E, id: Uuid) -> EngineResult<InstanceSize>
    where
        E: Executor<'c, Database = Postgres>,
    {
        sqlx::query_as::<_, InstanceSize>(
            r#"
            SELECT id, name, cpu_cores, memory_mb, disk_gb, cpu_request, memory_request_mb,
                   requires_gpu, requires_sriov, requires_hugepages, hugepages_size, dedicated_cpu, spec_overrides
            FROM instance_sizes WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| EngineError::new(ErrorCode::InstanceSizeNotFound, format!("instance size {id} not found")))
    }
}
