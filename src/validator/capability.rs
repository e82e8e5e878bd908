//! Capability token normalization and matching (spec §4.3 rule 4).
//! Grounded on `other_examples/0154ee08_…policy.rs.rs`'s
//! `RuntimeCapability`/`supports_all` shape, generalized from a fixed enum
//! to an open token set since cluster-reported features are free-form
//! strings.

use std::collections::BTreeSet;

use crate::models::InstanceSize;

pub const GPU: &str = "gpu";
pub const SRIOV: &str = "sriov";
pub const HUGEPAGES: &str = "hugepages";

/// Derives the set of capability tokens an [`InstanceSize`] requires from
/// its flags plus any `spec_overrides` paths that imply a capability
/// (`…devices.gpus`, `…devices.interfaces[*]` containing "sriov",
/// `…memory.hugepages.pageSize`).
pub fn required_capabilities(size: &InstanceSize) -> BTreeSet<String> {
    let mut caps = BTreeSet::new();

    if size.requires_gpu {
        caps.insert(GPU.to_string());
    }
    if size.requires_sriov {
        caps.insert(SRIOV.to_string());
    }
    if size.requires_hugepages {
        caps.insert(HUGEPAGES.to_string());
        if let Some(page_size) = &size.hugepages_size {
            caps.insert(format!("{HUGEPAGES}:{}", page_size.to_lowercase()));
        }
    }

    for (path, value) in &size.spec_overrides {
        let lower_path = path.to_lowercase();
        if lower_path.ends_with("devices.gpus") {
            caps.insert(GPU.to_string());
        }
        if lower_path.contains("devices.interfaces") {
            if value_contains_token(value, "sriov") {
                caps.insert(SRIOV.to_string());
            }
        }
        if lower_path.ends_with("memory.hugepages.pagesize") {
            caps.insert(HUGEPAGES.to_string());
            if let Some(page_size) = value.as_str() {
                caps.insert(format!("{HUGEPAGES}:{}", page_size.to_lowercase()));
            }
        }
    }

    caps
}

fn value_contains_token(value: &serde_json::Value, token: &str) -> bool {
    match value {
        serde_json::Value::String(s) => s.to_lowercase().contains(token),
        serde_json::Value::Array(items) => items.iter().any(|v| value_contains_token(v, token)),
        _ => false,
    }
}

/// Normalizes a cluster's raw `enabled_features` tokens to the same
/// vocabulary `required_capabilities` produces, so the two sets can be
/// compared with plain subset inclusion.
pub fn normalize_cluster_features(raw: &BTreeSet<String>) -> BTreeSet<String> {
    let mut caps = BTreeSet::new();

    for token in raw {
        let lower = token.to_lowercase();
        caps.insert(lower.clone());

        if lower.contains("nvidia.com/") {
            caps.insert(GPU.to_string());
        }
        if lower.contains("sriov") {
            caps.insert(SRIOV.to_string());
        }
        if lower.contains("hugepages-2mi") {
            caps.insert(HUGEPAGES.to_string());
            caps.insert(format!("{HUGEPAGES}:2mi"));
        }
        if lower.contains("hugepages-1gi") {
            caps.insert(HUGEPAGES.to_string());
            caps.insert(format!("{HUGEPAGES}:1gi"));
        }
    }

    caps
}

/// Returns the required tokens missing from the cluster's normalized set,
/// in deterministic (sorted) order for stable error messages.
pub fn missing_capabilities(required: &BTreeSet<String>, cluster_caps: &BTreeSet<String>) -> Vec<String> {
    required.difference(cluster_caps).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn base_size() -> InstanceSize {
        InstanceSize {
            id: Uuid::nil(),
            name: "small".into(),
            cpu_cores: 2.0,
            memory_mb: 4096,
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
    fn gpu_flag_requires_gpu_token() {
        let mut size = base_size();
        size.requires_gpu = true;
        let caps = required_capabilities(&size);
        assert!(caps.contains(GPU));
    }

    #[test]
    fn hugepages_expands_to_generic_and_sized_token() {
        let mut size = base_size();
        size.requires_hugepages = true;
        size.hugepages_size = Some("2Mi".into());
        let caps = required_capabilities(&size);
        assert!(caps.contains(HUGEPAGES));
        assert!(caps.contains("hugepages:2mi"));
    }

    #[test]
    fn spec_override_gpu_path_implies_gpu() {
        let mut size = base_size();
        size.spec_overrides.insert(
            "spec.template.spec.domain.devices.gpus".into(),
            serde_json::json!([{"name": "gpu0"}]),
        );
        let caps = required_capabilities(&size);
        assert!(caps.contains(GPU));
    }

    #[test]
    fn cluster_features_normalize_nvidia_and_sriov_tokens() {
        let raw: BTreeSet<String> = ["nvidia.com/gpu".to_string(), "intel.com/sriov".to_string()]
            .into_iter()
            .collect();
        let normalized = normalize_cluster_features(&raw);
        assert!(normalized.contains(GPU));
        assert!(normalized.contains(SRIOV));
    }

    #[test]
    fn missing_capabilities_reports_only_the_gap() {
        let required: BTreeSet<String> = [GPU.to_string(), SRIOV.to_string()].into_iter().collect();
        let available: BTreeSet<String> = [GPU.to_string()].into_iter().collect();
        assert_eq!(missing_capabilities(&required, &available), vec![SRIOV.to_string()]);
    }
}
