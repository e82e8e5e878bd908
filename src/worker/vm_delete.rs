//! VMDeleteWorker (spec §4.5). Analogous to [`super::vm_create`]; on
//! success the VM row moves to `DELETED`, a distinct terminal status from
//! `STOPPED` so `VmStatus::is_deletable` never matches an already-deleted
//! VM and a second `DELETE` against it fails the §4.9 state guard instead
//! of silently re-running. This crate's retention policy keeps the row
//! (rather than removing it outright) since it is the audit trail's join
//! target.

use crate::errors::EngineResult;
use crate::events::EventStatus;
use crate::store::DomainEventStore;
use crate::models::{TicketStatus, VmStatus};
use crate::provider::{ClusterRef, VmProvider};
use crate::queue::VmDeleteArgs;
use crate::store::{ApprovalTicketStore, VmStore};

use sqlx::PgPool;

pub async fn run(pool: &PgPool, provider: &dyn VmProvider, args: &VmDeleteArgs) -> EngineResult<()> {
    let ticket = ApprovalTicketStore::get_by_event(pool, args.event_id).await?;
    let vm = VmStore::get_by_ticket(pool, ticket.id).await?;
    let cluster_id = vm.cluster_id.ok_or_else(|| crate::errors::EngineError::internal("vm has no cluster_id at delete time"))?;
    let cluster = ClusterRef { cluster_id };

    ApprovalTicketStore::set_status(pool, ticket.id, TicketStatus::Executing).await?;

    let result = provider.delete_vm(&cluster, &vm.name, &vm.namespace).await;

    match result {
        Ok(()) => {
            VmStore::set_status(pool, vm.id, VmStatus::Deleted).await?;
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
