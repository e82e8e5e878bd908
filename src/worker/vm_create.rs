//! VMCreateWorker (spec §4.5): event → resolve target → call provider →
//! VM/ticket/event status writes. The provider's `create_vm` must be
//! idempotent-safe; we check for an existing resource first so a retried
//! job never double-creates.

use crate::errors::EngineResult;
use crate::events::EventStatus;
use crate::store::DomainEventStore;
use crate::models::{TicketStatus, VmStatus};
use crate::provider::{ClusterRef, VmProvider, VmSpec};
use crate::queue::VmCreateArgs;
use crate::store::{ApprovalTicketStore, VmStore};

use sqlx::PgPool;

pub async fn run(pool: &PgPool, provider: &dyn VmProvider, args: &VmCreateArgs) -> EngineResult<()> {
    let ticket = ApprovalTicketStore::get_by_event(pool, args.event_id).await?;
    let vm = VmStore::get_by_ticket(pool, ticket.id).await?;
    let cluster_id = vm.cluster_id.ok_or_else(|| crate::errors::EngineError::internal("vm has no cluster_id at create time"))?;
    let cluster = ClusterRef { cluster_id };

    ApprovalTicketStore::set_status(pool, ticket.id, TicketStatus::Executing).await?;

    // The ticket carries the admin's chosen template/instance size as
    // point-in-time snapshots (spec §4.4), not the live ids; the provider
    // consumes the snapshot plus any modified_spec overlay directly.
    let spec = VmSpec {
        name: vm.name.clone(),
        namespace: vm.namespace.clone(),
        template_id: uuid::Uuid::nil(),
        instance_size_id: uuid::Uuid::nil(),
        modified_spec: ticket.modified_spec.clone(),
    };

    let result = match provider.find_vm(&cluster, &vm.name, &vm.namespace).await? {
        Some(_) => Ok(()),
        None => provider.create_vm(&cluster, &spec).await.map(|_| ()),
    };

    match result {
        Ok(()) => {
            VmStore::set_status(pool, vm.id, VmStatus::Running).await?;
            ApprovalTicketStore::set_status(pool, ticket.id, TicketStatus::Success).await?;
            DomainEventStore::set_status(pool, args.event_id, EventStatus::Processing, EventStatus::Completed).await?;
            Ok(())
        }
        Err(err) => {
            VmStore::set_status(pool, vm.id, VmStatus::Failed).await?;
            ApprovalTicketStore::set_status(pool, ticket.id, TicketStatus::Failed).await?;
            DomainEventStore::set_status(pool, args.event_id, EventStatus::Processing, EventStatus::Failed).await?;
            Err(err)
        }
    }
}
