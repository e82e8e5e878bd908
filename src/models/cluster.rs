use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterStatus {
    Unknown,
    Healthy,
    Unhealthy,
    Unreachable,
}

/// Deployment environment tier. Governs namespace/cluster isolation
/// (spec I-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    Test,
    Prod,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Cluster {
    pub id: Uuid,
    pub name: String,
    pub api_server_url: String,
    /// Opaque ciphertext; the secret store that produces/consumes it is an
    /// external collaborator out of scope for this crate (spec §1).
    pub encrypted_kubeconfig: Vec<u8>,
    pub status: ClusterStatus,
    pub environment: Environment,
    #[sqlx(json)]
    pub enabled_features: BTreeSet<String>,
    pub enabled: bool,
}

impl Cluster {
    pub fn is_live(&self) -> bool {
        self.enabled && self.status == ClusterStatus::Healthy
    }
}
