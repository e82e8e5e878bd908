//! Request Intake: spec §2's first pipeline step, "requester input → (C1
//! event + C2 ticket) in one transaction". Everything gated ahead of that
//! write — the rate limiter (C12, spec §4.7), the duplicate request guard
//! (§4.8), and the delete confirmation tier (§4.9) — runs first so a
//! rejected submission is never persisted. Grounded on the same
//! "coordinator owns the whole multi-step operation" discipline as
//! [`crate::atomic_writer::AtomicWriter`], one level upstream of it in the
//! pipeline.

use sqlx::PgPool;
use uuid::Uuid;

use crate::delete_confirmation::{check_delete_confirmation, DeleteConfirmation};
use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::events::payload::{BatchPayload, EventPayload, VmCreationPayload, VmDeletePayload};
use crate::events::{BatchChildPayload, EventType};
use crate::store::DomainEventStore;
use crate::models::batch::BatchType;
use crate::models::OperationType;
use crate::rate_limit::{RateLimitGovernor, SubmissionKind};
use crate::store::{ApprovalTicketStore, BatchStore, DuplicateGuard, NamespaceStore, VmStore};

pub struct CreateRequest {
    pub requester_id: String,
    pub service_id: Uuid,
    pub template_id: Uuid,
    pub instance_size_id: Uuid,
    pub namespace: String,
    pub reason: String,
}

pub struct DeleteRequest<'a> {
    pub requester_id: String,
    pub vm_id: Uuid,
    pub confirmation: DeleteConfirmation<'a>,
}

pub struct SubmittedTicket {
    pub ticket_id: Uuid,
    pub event_id: Uuid,
}

pub struct SubmittedBatch {
    pub batch_id: Uuid,
    pub children: Vec<SubmittedTicket>,
}

pub struct RequestIntake {
    pool: PgPool,
    rate_limit: RateLimitGovernor,
}

impl RequestIntake {
    pub fn new(pool: PgPool, rate_limit: RateLimitGovernor) -> Self {
        RequestIntake { pool, rate_limit }
    }

    /// Singleton CREATE: rate limit, then duplicate guard and the (event,
    /// ticket) write happen inside one transaction so the duplicate check
    /// is re-verified against the same snapshot it writes against.
    pub async fn submit_create(&self, request: CreateRequest) -> EngineResult<SubmittedTicket> {
        self.rate_limit.check(&self.pool, &request.requester_id, SubmissionKind::Singleton).await?;

        let mut tx = self.pool.begin().await?;

        DuplicateGuard::check_create(
            &mut *tx,
            &request.requester_id,
            request.service_id,
            request.template_id,
            request.instance_size_id,
            &request.namespace,
        )
        .await?;

        let payload = creation_payload(&request);
        let event_id = DomainEventStore::append(
            &mut *tx,
            EventType::VmCreationRequested,
            "service",
            request.service_id,
            &payload,
            &request.requester_id,
        )
        .await?;
        let ticket_id =
            ApprovalTicketStore::create(&mut *tx, event_id, OperationType::Create, &request.requester_id, Some(&request.reason), None)
                .await?;

        tx.commit().await?;
        Ok(SubmittedTicket { ticket_id, event_id })
    }

    /// Singleton DELETE: state guard and the §4.9 confirmation tier run
    /// against a fresh read of the VM row before the rate limiter and
    /// duplicate guard, then the (event, ticket) write.
    pub async fn submit_delete(&self, request: DeleteRequest<'_>) -> EngineResult<SubmittedTicket> {
        let vm = VmStore::get(&self.pool, request.vm_id).await?;
        if !vm.status.is_deletable() {
            return Err(EngineError::new(
                ErrorCode::VmNotDeletable,
                format!("vm {} is not in a deletable state", vm.id),
            ));
        }
        let namespace = NamespaceStore::get_by_name(&self.pool, &vm.namespace).await?;
        check_delete_confirmation(namespace.environment, &vm.name, &request.confirmation)?;

        self.rate_limit.check(&self.pool, &request.requester_id, SubmissionKind::Singleton).await?;

        let mut tx = self.pool.begin().await?;

        DuplicateGuard::check_delete(&mut *tx, &request.requester_id, request.vm_id).await?;

        let cluster_id = vm.cluster_id.ok_or_else(|| {
            EngineError::internal(format!("vm {} has no cluster_id but is deletable", vm.id))
        })?;
        let payload = EventPayload::VmDelete(VmDeletePayload {
            vm_id: vm.id,
            vm_name: vm.name.clone(),
            cluster_id,
            namespace: vm.namespace.clone(),
            actor: request.requester_id.clone(),
        });
        let event_id =
            DomainEventStore::append(&mut *tx, EventType::VmDeletionRequested, "vm", vm.id, &payload, &request.requester_id).await?;
        let ticket_id =
            ApprovalTicketStore::create(&mut *tx, event_id, OperationType::Delete, &request.requester_id, None, None).await?;

        tx.commit().await?;
        Ok(SubmittedTicket { ticket_id, event_id })
    }

    /// Batch CREATE: one rate-limit check against the parent-batch cap,
    /// then every child's (event, ticket) pair plus the parent projection
    /// row are written in one transaction (spec §2, §4.6). The duplicate
    /// guard only applies to singletons per spec §4.8, so it is not
    /// consulted here.
    pub async fn submit_batch_create(
        &self,
        created_by: &str,
        reason: Option<&str>,
        request_id: Option<&str>,
        children: Vec<CreateRequest>,
    ) -> EngineResult<SubmittedBatch> {
        if children.is_empty() {
            return Err(EngineError::new(ErrorCode::ValidationFailed, "batch has no children"));
        }
        self.rate_limit.check(&self.pool, created_by, SubmissionKind::ParentBatch).await?;

        let batch_id = Uuid::now_v7();
        let mut tx = self.pool.begin().await?;

        let mut submitted = Vec::with_capacity(children.len());
        let mut child_payloads = Vec::with_capacity(children.len());
        for request in &children {
            let payload = creation_payload(request);
            let event_id = DomainEventStore::append(
                &mut *tx,
                EventType::VmCreationRequested,
                "service",
                request.service_id,
                &payload,
                &request.requester_id,
            )
            .await?;
            let ticket_id = ApprovalTicketStore::create(
                &mut *tx,
                event_id,
                OperationType::Create,
                &request.requester_id,
                Some(&request.reason),
                Some(batch_id),
            )
            .await?;
            child_payloads.push(BatchChildPayload { child_event_id: event_id, payload });
            submitted.push(SubmittedTicket { ticket_id, event_id });
        }

        let parent_payload = EventPayload::Batch(BatchPayload { batch_type: EventType::BatchCreateRequested, children: child_payloads });
        DomainEventStore::append(&mut *tx, EventType::BatchCreateRequested, "batch", batch_id, &parent_payload, created_by).await?;

        BatchStore::create(&mut *tx, batch_id, BatchType::BatchCreate, created_by, reason, request_id, children.len() as i32).await?;

        tx.commit().await?;
        Ok(SubmittedBatch { batch_id, children: submitted })
    }

    /// Batch DELETE: each child VM's state guard and confirmation tier are
    /// checked against a fresh read before the transaction opens, same as
    /// the singleton path.
    pub async fn submit_batch_delete(
        &self,
        created_by: &str,
        reason: Option<&str>,
        request_id: Option<&str>,
        children: Vec<DeleteRequest<'_>>,
    ) -> EngineResult<SubmittedBatch> {
        if children.is_empty() {
            return Err(EngineError::new(ErrorCode::ValidationFailed, "batch has no children"));
        }
        self.rate_limit.check(&self.pool, created_by, SubmissionKind::ParentBatch).await?;

        let mut checked = Vec::with_capacity(children.len());
        for request in children {
            let vm = VmStore::get(&self.pool, request.vm_id).await?;
            if !vm.status.is_deletable() {
                return Err(EngineError::new(
                    ErrorCode::VmNotDeletable,
                    format!("vm {} is not in a deletable state", vm.id),
                ));
            }
            let namespace = NamespaceStore::get_by_name(&self.pool, &vm.namespace).await?;
            check_delete_confirmation(namespace.environment, &vm.name, &request.confirmation)?;
            checked.push((request, vm));
        }

        let batch_id = Uuid::now_v7();
        let mut tx = self.pool.begin().await?;

        let mut submitted = Vec::with_capacity(checked.len());
        let mut child_payloads = Vec::with_capacity(checked.len());
        for (request, vm) in &checked {
            let cluster_id = vm.cluster_id.ok_or_else(|| {
                EngineError::internal(format!("vm {} has no cluster_id but is deletable", vm.id))
            })?;
            let payload = EventPayload::VmDelete(VmDeletePayload {
                vm_id: vm.id,
                vm_name: vm.name.clone(),
                cluster_id,
                namespace: vm.namespace.clone(),
                actor: request.requester_id.clone(),
            });
            let event_id =
                DomainEventStore::append(&mut *tx, EventType::VmDeletionRequested, "vm", vm.id, &payload, &request.requester_id).await?;
            let ticket_id = ApprovalTicketStore::create(
                &mut *tx,
                event_id,
                OperationType::Delete,
                &request.requester_id,
                None,
                Some(batch_id),
            )
            .await?;
            child_payloads.push(BatchChildPayload { child_event_id: event_id, payload });
            submitted.push(SubmittedTicket { ticket_id, event_id });
        }

        let parent_payload = EventPayload::Batch(BatchPayload { batch_type: EventType::BatchDeleteRequested, children: child_payloads });
        DomainEventStore::append(&mut *tx, EventType::BatchDeleteRequested, "batch", batch_id, &parent_payload, created_by).await?;

        BatchStore::create(&mut *tx, batch_id, BatchType::BatchDelete, created_by, reason, request_id, checked.len() as i32).await?;

        tx.commit().await?;
        Ok(SubmittedBatch { batch_id, children: submitted })
    }
}

fn creation_payload(request: &CreateRequest) -> EventPayload {
    EventPayload::VmCreation(VmCreationPayload {
        service_id: request.service_id,
        template_id: request.template_id,
        instance_size_id: request.instance_size_id,
        namespace: request.namespace.clone(),
        reason: request.reason.clone(),
        requester_id: request.requester_id.clone(),
    })
}
