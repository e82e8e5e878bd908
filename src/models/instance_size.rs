use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct InstanceSize {
    pub id: Uuid,
    pub name: String,
    pub cpu_cores: f64,
    pub memory_mb: i64,
    pub disk_gb: Option<i64>,
    pub cpu_request: Option<f64>,
    pub memory_request_mb: Option<i64>,
    pub requires_gpu: bool,
    pub requires_sriov: bool,
    pub requires_hugepages: bool,
    pub hugepages_size: Option<String>,
    pub dedicated_cpu: bool,
    /// path -> value, e.g. `"spec.devices.gpus" -> [...]`. Stored as JSON,
    /// consulted by the capability matcher (spec §4.3 rule 4).
    #[sqlx(json)]
    pub spec_overrides: BTreeMap<String, Value>,
}

impl InstanceSize {
    /// Effective CPU request used in the overcommit check: the explicit
    /// request if positive, else the full core count (spec §4.3 rule 3).
    pub fn effective_cpu_request(&self) -> f64 {
        match self.cpu_request {
            Some(r) if r > 0.0 => r,
            _ => self.cpu_cores,
        }
    }

    /// Effective memory request, same rule as CPU but in MB.
    pub fn effective_memory_request_mb(&self) -> i64 {
        match self.memory_request_mb {
            Some(r) if r > 0 => r,
            _ => self.memory_mb,
        }
    }
}
