use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// VM status enum per spec §3. `Pending` is retained only as a
/// provider-reported live-sync status (see spec §9 open question) — the
/// atomic writer and worker runtime never write it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VmStatus {
    Creating,
    Running,
    Stopping,
    Stopped,
    Deleting,
    Deleted,
    Failed,
    Pending,
    Migrating,
    Paused,
    Unknown,
}

impl VmStatus {
    /// §4.9: only VMs in these states are eligible for deletion.
    pub fn is_deletable(&self) -> bool {
        matches!(self, VmStatus::Stopped | VmStatus::Failed)
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Vm {
    pub id: Uuid,
    pub name: String,
    pub instance: String,
    pub namespace: String,
    pub cluster_id: Option<Uuid>,
    pub status: VmStatus,
    pub hostname: String,
    pub created_by: String,
    pub ticket_id: Option<Uuid>,
    pub service_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Formats the monotonic instance index as a minimum-width-2 zero-padded
/// decimal string, per spec §4.4 step 3.
pub fn format_instance_index(index: i64) -> String {
    format!("{index:0>2}")
}

/// `vm_name = "{namespace}-{system}-{service}-{instance}"`, per spec §4.4.
pub fn build_vm_name(namespace: &str, system_name: &str, service_name: &str, instance: &str) -> String {
    format!("{namespace}-{system_name}-{service_name}-{instance}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_index_is_zero_padded_minimum_two() {
        assert_eq!(format_instance_index(1), "01");
        assert_eq!(format_instance_index(9), "09");
        assert_eq!(format_instance_index(10), "10");
        assert_eq!(format_instance_index(123), "123");
    }

    #[test]
    fn vm_name_matches_expected_shape() {
        assert_eq!(
            build_vm_name("dev-a", "shop", "svca", "01"),
            "dev-a-shop-svca-01"
        );
    }

    #[test]
    fn deletable_states_are_exactly_stopped_and_failed() {
        assert!(VmStatus::Stopped.is_deletable());
        assert!(VmStatus::Failed.is_deletable());
        assert!(!VmStatus::Running.is_deletable());
        assert!(!VmStatus::Pending.is_deletable());
        assert!(!VmStatus::Creating.is_deletable());
    }
}
