//! Stable job payload shapes (spec §6). These are the only argument types
//! the durable queue ever stores; workers decode them by `kind`.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobKind {
    VmCreate,
    VmDelete,
    VmPower,
    NotificationCleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum PowerAction {
    Start,
    Stop,
    Restart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmCreateArgs {
    pub event_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmDeleteArgs {
    pub event_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmPowerArgs {
    pub event_id: Uuid,
    pub action: PowerAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationCleanupArgs {}

/// A job's args, tagged so a freshly-polled row can be decoded without a
/// separate lookup table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum JobArgs {
    VmCreate(VmCreateArgs),
    VmDelete(VmDeleteArgs),
    VmPower(VmPowerArgs),
    NotificationCleanup(NotificationCleanupArgs),
}

impl JobArgs {
    pub fn kind(&self) -> JobKind {
        match self {
            JobArgs::VmCreate(_) => JobKind::VmCreate,
            JobArgs::VmDelete(_) => JobKind::VmDelete,
            JobArgs::VmPower(_) => JobKind::VmPower,
            JobArgs::NotificationCleanup(_) => JobKind::NotificationCleanup,
        }
    }
}
