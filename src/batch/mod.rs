//! Batch Aggregator (C9, spec §4.6). On approve/reject/cancel of a batch
//! parent ticket, fans out to every still-`PENDING` child using the same
//! individual logic the singleton paths use, then recomputes the parent's
//! projection from the children's resulting statuses. Grounded on the
//! teacher's `transaction.rs` `commit_environment` fan-out over child
//! services: one coordinator owns the whole multi-child operation, and one
//! child's failure never aborts the others.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::atomic_writer::{ApproveCreateInput, ApproveDeleteInput, AtomicWriter};
use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::events::DomainEvent;
use crate::store::DomainEventStore;
use crate::models::batch::BatchStatus;
use crate::models::{ApprovalTicket, OperationType, TicketStatus};
use crate::notifier::{NotificationPublisher, NotificationTrigger};
use crate::store::{ApprovalTicketStore, BatchStore};

pub struct BatchAggregator<N: NotificationPublisher> {
    pool: PgPool,
    atomic_writer: Arc<AtomicWriter<N>>,
}

/// Per-child context an admin supplies once for the whole batch (spec
/// §4.6 implies a single cluster/storage-class choice governs every child
/// of a `BATCH_CREATE_REQUESTED` parent).
pub struct BatchCreateApproval {
    pub approver: String,
    pub cluster_id: Uuid,
    pub storage_class: Option<String>,
    pub template_version: Option<String>,
}

impl<N: NotificationPublisher> BatchAggregator<N> {
    pub fn new(pool: PgPool, atomic_writer: Arc<AtomicWriter<N>>) -> Self {
        BatchAggregator { pool, atomic_writer }
    }

    /// Approves a `BATCH_CREATE_REQUESTED` parent: every `PENDING` child
    /// is approved with the same cluster/storage-class choice, using its
    /// own event payload for `service_id`/`namespace`/`requester_id`.
    /// Dispatch failures mark that child `FAILED` (truncated to 512
    /// characters) but never abort the batch.
    pub async fn approve_create_batch(&self, parent_id: Uuid, approval: BatchCreateApproval) -> EngineResult<BatchStatus> {
        let parent = BatchStore::get(&self.pool, parent_id).await?;
        self.require_pending_children(parent_id).await?;

        let children = ApprovalTicketStore::children(&self.pool, parent_id).await?;
        for child in children.into_iter().filter(|c| c.status == TicketStatus::Pending) {
            if child.operation_type != OperationType::Create {
                continue;
            }

            let event: DomainEvent = match DomainEventStore::get(&self.pool, child.event_id).await {
                Ok(e) => e,
                Err(err) => {
                    self.mark_dispatch_failed(&child, &err.to_string()).await;
                    continue;
                }
            };

            let payload = match event.decode_payload() {
                Ok(crate::events::payload::EventPayload::VmCreation(p)) => p,
                _ => {
                    self.mark_dispatch_failed(&child, "batch child event has the wrong payload shape").await;
                    continue;
                }
            };

            let input = ApproveCreateInput {
                ticket_id: child.id,
                event_id: child.event_id,
                approver: approval.approver.clone(),
                cluster_id: approval.cluster_id,
                storage_class: approval.storage_class.clone(),
                service_id: payload.service_id,
                namespace: payload.namespace,
                requester_id: payload.requester_id,
                instance_size_id: payload.instance_size_id,
                template_version: approval.template_version.clone(),
                template_snapshot: None,
                instance_size_snapshot: None,
                modified_spec: None,
            };

            if let Err(err) = self.atomic_writer.approve_create_and_enqueue(input).await {
                self.mark_dispatch_failed(&child, &err.to_string()).await;
            }
        }

        let status = self.recompute(parent_id).await?;
        self.notify_if_terminal(parent_id, &parent.created_by, status);
        Ok(status)
    }

    /// Approves a `BATCH_DELETE_REQUESTED` parent: every `PENDING` child
    /// is approved for deletion. `vm_id` for each child comes from its own
    /// `VmDeletePayload`.
    pub async fn approve_delete_batch(&self, parent_id: Uuid, approver: &str) -> EngineResult<BatchStatus> {
        let parent = BatchStore::get(&self.pool, parent_id).await?;
        self.require_pending_children(parent_id).await?;

        let children = ApprovalTicketStore::children(&self.pool, parent_id).await?;
        for child in children.into_iter().filter(|c| c.status == TicketStatus::Pending) {
            if child.operation_type != OperationType::Delete {
                continue;
            }

            let event = match DomainEventStore::get(&self.pool, child.event_id).await {
                Ok(e) => e,
                Err(err) => {
                    self.mark_dispatch_failed(&child, &err.to_string()).await;
                    continue;
                }
            };

            let vm_id = match event.decode_payload() {
                Ok(crate::events::payload::EventPayload::VmDelete(p)) => Some(p.vm_id),
                _ => {
                    self.mark_dispatch_failed(&child, "batch child event has the wrong payload shape").await;
                    continue;
                }
            };

            let input = ApproveDeleteInput { ticket_id: child.id, event_id: child.event_id, approver: approver.to_string(), vm_id };

            if let Err(err) = self.atomic_writer.approve_delete_and_enqueue(input).await {
                self.mark_dispatch_failed(&child, &err.to_string()).await;
            }
        }

        let status = self.recompute(parent_id).await?;
        self.notify_if_terminal(parent_id, &parent.created_by, status);
        Ok(status)
    }

    /// Rejects every `PENDING` child with the same reason (spec §4.6).
    pub async fn reject_batch(&self, parent_id: Uuid, approver: &str, reject_reason: &str) -> EngineResult<BatchStatus> {
        let parent = BatchStore::get(&self.pool, parent_id).await?;
        let children = ApprovalTicketStore::children(&self.pool, parent_id).await?;

        for child in children.into_iter().filter(|c| c.status == TicketStatus::Pending) {
            if let Err(err) = self.atomic_writer.reject_and_cancel_event(child.id, child.event_id, approver, reject_reason).await {
                self.mark_dispatch_failed(&child, &err.to_string()).await;
            }
        }

        let status = self.recompute(parent_id).await?;
        self.notify_if_terminal(parent_id, &parent.created_by, status);
        Ok(status)
    }

    /// Cancels every `PENDING` child the requester owns (spec §4.6, §4.2
    /// cancel-forbidden rule applies per child).
    pub async fn cancel_batch(&self, parent_id: Uuid, caller: &str, requester: &str) -> EngineResult<BatchStatus> {
        let parent = BatchStore::get(&self.pool, parent_id).await?;
        let children = ApprovalTicketStore::children(&self.pool, parent_id).await?;

        for child in children.into_iter().filter(|c| c.status == TicketStatus::Pending) {
            if let Err(err) = self.atomic_writer.cancel_and_cancel_event(child.id, child.event_id, caller, requester).await {
                self.mark_dispatch_failed(&child, &err.to_string()).await;
            }
        }

        let status = self.recompute(parent_id).await?;
        self.notify_if_terminal(parent_id, &parent.created_by, status);
        Ok(status)
    }

    async fn require_pending_children(&self, parent_id: Uuid) -> EngineResult<()> {
        let children = ApprovalTicketStore::children(&self.pool, parent_id).await?;
        if children.is_empty() {
            return Err(EngineError::new(ErrorCode::ValidationFailed, "batch has no children"));
        }
        Ok(())
    }

    async fn mark_dispatch_failed(&self, child: &ApprovalTicket, reason: &str) {
        if let Err(err) = ApprovalTicketStore::mark_dispatch_failed(&self.pool, child.id, reason).await {
            tracing::error!(ticket_id = %child.id, error = %err, "failed to record batch dispatch failure");
        }
    }

    /// Recomputes and persists the parent projection (spec §4.6 formula),
    /// implemented by [`crate::models::batch::derive_batch_status`].
    async fn recompute(&self, parent_id: Uuid) -> EngineResult<BatchStatus> {
        let counts = BatchStore::child_counts(&self.pool, parent_id).await?;
        let status = crate::models::batch::derive_batch_status(counts);
        BatchStore::write_projection(&self.pool, parent_id, status, counts).await?;
        Ok(status)
    }

    fn notify_if_terminal(&self, parent_id: Uuid, created_by: &str, status: BatchStatus) {
        if matches!(status, BatchStatus::InProgress | BatchStatus::PendingApproval) {
            return;
        }
        self.atomic_writer_notifier().publish(NotificationTrigger::BatchCompleted {
            batch_id: parent_id,
            created_by: created_by.to_string(),
            status: status.to_string(),
        });
    }

    fn atomic_writer_notifier(&self) -> &N {
        self.atomic_writer.notifier()
    }
}
