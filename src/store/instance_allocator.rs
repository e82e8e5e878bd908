//! C4: monotonic per-service instance-index allocator (P4 — the issued
//! sequence is strictly increasing with no reuse, and no reset is ever
//! exposed). Allocation happens under a row lock on the parent `Service`,
//! held only for the duration of the atomic writer's single transaction
//! (spec §5).

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::models::vm::format_instance_index;

pub struct InstanceAllocator;

pub struct AllocatedInstance {
    pub instance: String,
    pub service_name: String,
    pub system_name: String,
}

impl InstanceAllocator {
    /// `SELECT ... FOR UPDATE` locks the service row, increments its
    /// counter, and returns the freshly allocated index formatted per spec
    /// §4.4 step 3. Must run inside the atomic writer's transaction: the
    /// row lock is released on commit/rollback of that transaction, not
    /// before.
    pub async fn allocate<'c, E>(executor: E, service_id: Uuid) -> EngineResult<AllocatedInstance>
    where
        E: Executor<'c, Database = Postgres>,
    {
        let row: (i64, String, String) = sqlx::query_as(
            r#"
            UPDATE services s
            SET next_instance_index = s.next_instance_index + 1
            FROM systems sys
            WHERE s.id = $1 AND sys.id = s.system_id
            RETURNING s.next_instance_index, s.name, sys.name
            "#,
        )
        .bind(service_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| EngineError::new(ErrorCode::Internal, format!("service {service_id} not found")))?;

        let (new_index, service_name, system_name) = row;
        // next_instance_index now holds the value just issued (post-increment).
        let issued_index = new_index;

        Ok(AllocatedInstance {
            instance: format_instance_index(issued_index),
            service_name,
            system_name,
        })
    }
}
