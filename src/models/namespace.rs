use serde::{Deserialize, Serialize};

use super::cluster::Environment;

/// **I-3**: a VM's namespace must be registered, enabled, and its
/// `environment` must equal the approving cluster's `environment`.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct NamespaceRegistry {
    pub name: String,
    pub environment: Environment,
    pub enabled: bool,
}
