//! Read-only lookup backing the approval validator (C5, spec §4.3 rule 1).
//! Cluster rows themselves are provisioned by an external collaborator out
//! of scope for this crate (spec §1); this store only ever reads them.

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::models::Cluster;

pub struct ClusterStore;

impl ClusterStore {
    pub async fn get<'c, E>(executor: E, id: Uuid) -> EngineResult<Cluster>
    where
        E: Executor<'c, Database = Postgres>,
    {
        sqlx::query_as::<_, Cluster>(
            r#"
            SELECT id, name, api_server_url, encrypted_kubeconfig, status, environment, enabled_features, enabled
            FROM clusters WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| EngineError::new(ErrorCode::ClusterNotFound, format!("cluster {id} not found")))
    }
}
