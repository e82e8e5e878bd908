//! External provider contract (spec §6). How KubeVirt VMs are actually
//! created is an external collaborator out of scope for this crate (spec
//! §1); only the trait boundary lives here, in the same small-surface
//! style as the teacher's `ContainerRegistry` trait
//! (`container_registry/mod.rs`): a handful of idempotent verbs returning
//! domain types, never cluster-native ones.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::EngineResult;

#[derive(Debug, Clone)]
pub struct VmSpec {
    pub name: String,
    pub namespace: String,
    pub template_id: Uuid,
    pub instance_size_id: Uuid,
    pub modified_spec: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct VmIdentity {
    pub uid: String,
    pub name: String,
    pub namespace: String,
}

/// A reference to the target cluster, resolved by the (out of scope)
/// credential loader from a `cluster_id` (spec §6).
#[derive(Debug, Clone)]
pub struct ClusterRef {
    pub cluster_id: Uuid,
}

/// Cluster-native KubeVirt types never cross this boundary — only
/// [`VmSpec`]/[`VmIdentity`]. Every verb must be idempotent by VM identity
/// (spec §6): the worker runtime relies on safe retries.
#[async_trait]
pub trait VmProvider: Send + Sync {
    async fn create_vm(&self, cluster: &ClusterRef, spec: &VmSpec) -> EngineResult<VmIdentity>;
    async fn delete_vm(&self, cluster: &ClusterRef, name: &str, namespace: &str) -> EngineResult<()>;
    async fn start_vm(&self, cluster: &ClusterRef, name: &str, namespace: &str) -> EngineResult<()>;
    async fn stop_vm(&self, cluster: &ClusterRef, name: &str, namespace: &str) -> EngineResult<()>;
    async fn restart_vm(&self, cluster: &ClusterRef, name: &str, namespace: &str) -> EngineResult<()>;
    /// Used by create workers to check for an existing resource before
    /// issuing a non-idempotent create call (spec §4.5).
    async fn find_vm(&self, cluster: &ClusterRef, name: &str, namespace: &str) -> EngineResult<Option<VmIdentity>>;
}
