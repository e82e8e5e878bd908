//! VMPowerWorker (spec §4.5): start/stop/restart on an already-governed
//! VM. No approval ticket backs this operation — the event alone carries
//! the target and action — but it follows the same event→job discipline
//! as the ticketed workers.

use crate::errors::EngineResult;
use crate::events::payload::VmPowerPayload;
use crate::events::{DomainEvent, EventStatus};
use crate::store::DomainEventStore;
use crate::models::VmStatus;
use crate::provider::{ClusterRef, VmProvider};
use crate::queue::{PowerAction, VmPowerArgs};
use crate::store::VmStore;

use sqlx::PgPool;
use uuid::Uuid;

pub async fn run(pool: &PgPool, provider: &dyn VmProvider, args: &VmPowerArgs) -> EngineResult<()> {
    let event: DomainEvent = DomainEventStore::get(pool, args.event_id).await?;
    let payload: VmPowerPayload = match event.decode_payload() {
        Ok(crate::events::payload::EventPayload::VmPower(p)) => p,
        _ => return Err(crate::errors::EngineError::internal("vm power event has the wrong payload shape")),
    };

    let vm_id: Uuid = payload.vm_id;
    let vm = VmStore::get(pool, vm_id).await?;
    let cluster = ClusterRef { cluster_id: payload.cluster_id };

    let in_flight_status = match args.action {
        PowerAction::Start => VmStatus::Running,
        PowerAction::Stop => VmStatus::Stopping,
        PowerAction::Restart => VmStatus::Running,
    };

    let result = match args.action {
        PowerAction::Start => provider.start_vm(&cluster, &vm.name, &vm.namespace).await,
        PowerAction::Stop => provider.stop_vm(&cluster, &vm.name, &vm.namespace).await,
        PowerAction::Restart => provider.restart_vm(&cluster, &vm.name, &vm.namespace).await,
    };

    match result {
        Ok(()) => {
            let final_status = match args.action {
                PowerAction::Stop => VmStatus::Stopped,
                _ => in_flight_status,
            };
            VmStore::set_status(pool, vm.id, final_status).await?;
            DomainEventStore::set_status(pool, args.event_id, EventStatus::Processing, EventStatus::Completed).await?;
            Ok(())
        }
        Err(err) => {
            VmStore::set_status(pool, vm.id, VmStatus::Failed).await?;
            DomainEventStore::set_status(pool, args.event_id, EventStatus::Processing, EventStatus::Failed).await?;
            Err(err)
        }
    }
}
