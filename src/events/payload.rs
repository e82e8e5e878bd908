//! Typed payload shapes carried by a [`super::DomainEvent`]. The store only
//! ever sees the canonical JSON encoding of one of these (spec §4.1); the
//! enum exists so the rest of the crate can construct/inspect payloads
//! without re-parsing `serde_json::Value` everywhere.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BatchChildPayload;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VmCreationPayload {
    pub service_id: Uuid,
    pub template_id: Uuid,
    pub instance_size_id: Uuid,
    pub namespace: String,
    pub reason: String,
    pub requester_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VmDeletePayload {
    pub vm_id: Uuid,
    pub vm_name: String,
    pub cluster_id: Uuid,
    pub namespace: String,
    pub actor: String,
}

/// No ticket governs power actions on an already-provisioned VM (spec
/// §4.5); the event itself carries everything the worker needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VmPowerPayload {
    pub vm_id: Uuid,
    pub cluster_id: Uuid,
    pub namespace: String,
    pub action: String,
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VncRequestPayload {
    pub vm_id: Uuid,
    pub cluster_id: Uuid,
    pub namespace: String,
    pub requester_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchPayload {
    pub batch_type: super::EventType,
    pub children: Vec<BatchChildPayload>,
}

/// Discriminated payload union. Serialized canonically (stable key
/// ordering via `serde_json`'s map representation plus `#[serde(tag=...)]`)
/// so identical logical inputs hash identically for duplicate detection
/// (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum EventPayload {
    VmCreation(VmCreationPayload),
    VmDelete(VmDeletePayload),
    VmPower(VmPowerPayload),
    VncRequest(VncRequestPayload),
    Batch(BatchPayload),
}

impl EventPayload {
    /// Canonical encoding used for both storage and duplicate-hash
    /// comparison. `serde_json` serializes struct fields in declaration
    /// order deterministically, which is sufficient canonicalization for
    /// our fixed, non-map-keyed payload shapes.
    pub fn to_canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_canonical_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_payloads_encode_identically() {
        let p1 = EventPayload::VmCreation(VmCreationPayload {
            service_id: Uuid::nil(),
            template_id: Uuid::nil(),
            instance_size_id: Uuid::nil(),
            namespace: "dev-a".into(),
            reason: "demo".into(),
            requester_id: "u1".into(),
        });
        let p2 = p1.clone();
        assert_eq!(p1.to_canonical_bytes().unwrap(), p2.to_canonical_bytes().unwrap());
    }

    #[test]
    fn round_trips_through_canonical_bytes() {
        let payload = EventPayload::VmDelete(VmDeletePayload {
            vm_id: Uuid::nil(),
            vm_name: "x".into(),
            cluster_id: Uuid::nil(),
            namespace: "ns".into(),
            actor: "u1".into(),
        });
        let bytes = payload.to_canonical_bytes().unwrap();
        let decoded = EventPayload::from_canonical_bytes(&bytes).unwrap();
        assert_eq!(payload, decoded);
    }
}
