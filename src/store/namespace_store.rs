//! Read-only lookup backing the approval validator (C5, spec §4.3 rule 2)
//! and the delete confirmation tier (§4.9). Namespace registrations are
//! provisioned out of scope for this crate (spec §1); keyed by `name`
//! since `NamespaceRegistry` has no surrogate id (spec §3).

use sqlx::{Executor, Postgres};

use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::models::NamespaceRegistry;

pub struct NamespaceStore;

impl NamespaceStore {
    pub async fn get_by_name<'c, E>(executor: E, name: &str) -> EngineResult<NamespaceRegistry>
    where
        E: Executor<'c, Database = Postgres>,
    {
        sqlx::query_as::<_, NamespaceRegistry>(
            r#"SELECT name, environment, enabled FROM namespace_registry WHERE name = $1"#,
        )
        .bind(name)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| EngineError::new(ErrorCode::NamespaceNotFound, format!("namespace {name} not found")))
    }
}
