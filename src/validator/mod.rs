//! Approval Validator (C5). Given the admin's chosen cluster/instance
//! size/namespace, runs the ordered, short-circuiting rule chain from spec
//! §4.3.

pub mod capability;

use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::models::{Cluster, InstanceSize, NamespaceRegistry};

pub struct ApprovalValidator;

pub struct ValidationInput<'a> {
    pub cluster: &'a Cluster,
    pub namespace: &'a NamespaceRegistry,
    pub instance_size: &'a InstanceSize,
}

impl ApprovalValidator {
    /// Runs rules 1-4 of spec §4.3 in order, short-circuiting on the first
    /// failure.
    pub fn validate(input: ValidationInput<'_>) -> EngineResult<()> {
        Self::check_cluster_liveness(input.cluster)?;
        Self::check_namespace_isolation(input.namespace, input.cluster)?;
        Self::check_overcommit(input.instance_size)?;
        Self::check_capabilities(input.instance_size, input.cluster)?;
        Ok(())
    }

    /// Rule 1: cluster exists (implied by having a [`Cluster`] to check)
    /// and is `HEALTHY`.
    fn check_cluster_liveness(cluster: &Cluster) -> EngineResult<()> {
        if !cluster.is_live() {
            return Err(EngineError::new(
                ErrorCode::ClusterUnhealthy,
                format!("cluster {} is not healthy (status: {})", cluster.name, cluster.status),
            ));
        }
        Ok(())
    }

    /// Rule 2: namespace registered, enabled, and its environment matches
    /// the cluster's (**I-3**).
    fn check_namespace_isolation(namespace: &NamespaceRegistry, cluster: &Cluster) -> EngineResult<()> {
        if !namespace.enabled {
            return Err(EngineError::new(
                ErrorCode::NamespacePermissionDenied,
                format!("namespace {} is disabled", namespace.name),
            ));
        }
        if namespace.environment != cluster.environment {
            return Err(EngineError::new(
                ErrorCode::NamespaceClusterEnvMismatch,
                format!(
                    "namespace {} is {} but cluster {} is {}",
                    namespace.name, namespace.environment, cluster.name, cluster.environment
                ),
            ));
        }
        Ok(())
    }

    /// Rule 3: overcommit arithmetic over the instance size.
    fn check_overcommit(size: &InstanceSize) -> EngineResult<()> {
        let r_cpu = size.effective_cpu_request();
        let r_mem = size.effective_memory_request_mb();

        if size.dedicated_cpu && r_cpu != size.cpu_cores {
            return Err(EngineError::new(
                ErrorCode::DedicatedCpuOvercommitConflict,
                "dedicated_cpu instance sizes must request exactly their full core count (Guaranteed QoS)",
            ));
        }
        if r_cpu > size.cpu_cores {
            return Err(EngineError::new(
                ErrorCode::OvercommitInvalid,
                format!("cpu request {r_cpu} exceeds cpu_cores {}", size.cpu_cores),
            ));
        }
        if r_mem > size.memory_mb {
            return Err(EngineError::new(
                ErrorCode::OvercommitInvalid,
                format!("memory request {r_mem}mb exceeds memory_mb {}", size.memory_mb),
            ));
        }
        Ok(())
    }

    /// Rule 4: every normalized required capability token must be present
    /// in the cluster's normalized feature set (**P6**).
    fn check_capabilities(size: &InstanceSize, cluster: &Cluster) -> EngineResult<()> {
        let required = capability::required_capabilities(size);
        if required.is_empty() {
            return Ok(());
        }

        let available = capability::normalize_cluster_features(&cluster.enabled_features);
        let missing = capability::missing_capabilities(&required, &available);

        if !missing.is_empty() {
            return Err(EngineError::new(
                ErrorCode::ValidationFailed,
                format!("cluster {} is missing required capabilities: {}", cluster.name, missing.join(", ")),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClusterStatus, Environment};
    use std::collections::{BTreeMap, BTreeSet};
    use uuid::Uuid;

    fn healthy_test_cluster() -> Cluster {
        Cluster {
            id: Uuid::nil(),
            name: "cl-test".into(),
            api_server_url: "https://cl-test".into(),
            encrypted_kubeconfig: vec![],
            status: ClusterStatus::Healthy,
            environment: Environment::Test,
            enabled_features: BTreeSet::new(),
            enabled: true,
        }
    }

    fn enabled_namespace(env: Environment) -> NamespaceRegistry {
        NamespaceRegistry { name: "dev-a".into(), environment: env, enabled: true }
    }

    fn plain_size() -> InstanceSize {
        InstanceSize {
            id: Uuid::nil(),
            name: "small".into(),
            cpu_cores: 4.0,
            memory_mb: 8192,
            disk_gb: None,
            cpu_request: None,
            memory_request_mb: None,
            requires_gpu: false,
            requires_sriov: false,
            requires_hugepages: false,
            hugepages_size: None,
            dedicated_cpu: false,
            spec_overrides: BTreeMap::new(),
        }
    }

    #[test]
    fn happy_path_passes_all_rules() {
        let cluster = healthy_test_cluster();
        let namespace = enabled_namespace(Environment::Test);
        let size = plain_size();
        assert!(ApprovalValidator::validate(ValidationInput { cluster: &cluster, namespace: &namespace, instance_size: &size }).is_ok());
    }

    #[test]
    fn unhealthy_cluster_is_rejected() {
        let mut cluster = healthy_test_cluster();
        cluster.status = ClusterStatus::Unhealthy;
        let namespace = enabled_namespace(Environment::Test);
        let size = plain_size();
        let err = ApprovalValidator::validate(ValidationInput { cluster: &cluster, namespace: &namespace, instance_size: &size }).unwrap_err();
        assert_eq!(err.code, ErrorCode::ClusterUnhealthy);
    }

    #[test]
    fn env_mismatch_is_rejected() {
        let cluster = healthy_test_cluster(); // test
        let namespace = enabled_namespace(Environment::Prod);
        let size = plain_size();
        let err = ApprovalValidator::validate(ValidationInput { cluster: &cluster, namespace: &namespace, instance_size: &size }).unwrap_err();
        assert_eq!(err.code, ErrorCode::NamespaceClusterEnvMismatch);
    }

    #[test]
    fn dedicated_cpu_overcommit_conflict_is_detected() {
        let cluster = healthy_test_cluster();
        let namespace = enabled_namespace(Environment::Test);
        let mut size = plain_size();
        size.dedicated_cpu = true;
        size.cpu_request = Some(2.0);
        size.cpu_cores = 4.0;
        let err = ApprovalValidator::validate(ValidationInput { cluster: &cluster, namespace: &namespace, instance_size: &size }).unwrap_err();
        assert_eq!(err.code, ErrorCode::DedicatedCpuOvercommitConflict);
    }

    #[test]
    fn plain_overcommit_is_detected() {
        let cluster = healthy_test_cluster();
        let namespace = enabled_namespace(Environment::Test);
        let mut size = plain_size();
        size.cpu_request = Some(8.0);
        let err = ApprovalValidator::validate(ValidationInput { cluster: &cluster, namespace: &namespace, instance_size: &size }).unwrap_err();
        assert_eq!(err.code, ErrorCode::OvercommitInvalid);
    }

    #[test]
    fn missing_capability_is_reported() {
        let cluster = healthy_test_cluster();
        let namespace = enabled_namespace(Environment::Test);
        let mut size = plain_size();
        size.requires_gpu = true;
        let err = ApprovalValidator::validate(ValidationInput { cluster: &cluster, namespace: &namespace, instance_size: &size }).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert!(err.message.contains("gpu"));
    }
}
