//! Atomic Writer (C6): the core correctness mechanism of the pipeline
//! (spec §4.4). Every approval decision that has a downstream side effect
//! runs here, inside exactly one database transaction, so the ticket/event/
//! VM state and the enqueued job either all become visible together or not
//! at all (**P2**). Grounded on the teacher's `transaction.rs`: one place
//! owns the whole multi-step operation and is the sole caller of
//! commit/rollback.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::events::payload::{EventPayload, VmCreationPayload, VmDeletePayload, VmPowerPayload};
use crate::events::{EventStatus, EventType};
use crate::models::vm::build_vm_name;
use crate::notifier::{NotificationPublisher, NotificationTrigger};
use crate::queue::{JobArgs, JobQueue, PowerAction, VmCreateArgs, VmDeleteArgs, VmPowerArgs};
use crate::store::{
    AllocatedInstance, ApprovalTicketStore, AuditLog, ClusterStore, DomainEventStore, InstanceAllocator,
    InstanceSizeStore, NamespaceStore, VmStore,
};
use crate::validator::{ApprovalValidator, ValidationInput};

pub struct ApproveCreateInput {
    pub ticket_id: Uuid,
    pub event_id: Uuid,
    pub approver: String,
    pub cluster_id: Uuid,
    pub storage_class: Option<String>,
    pub service_id: Uuid,
    pub namespace: String,
    pub requester_id: String,
    pub instance_size_id: Uuid,
    pub template_version: Option<String>,
    pub template_snapshot: Option<Value>,
    pub instance_size_snapshot: Option<Value>,
    pub modified_spec: Option<Value>,
}

#[derive(Debug)]
pub struct ApprovedVm {
    pub vm_id: Uuid,
    pub vm_name: String,
}

pub struct ApproveDeleteInput {
    pub ticket_id: Uuid,
    pub event_id: Uuid,
    pub approver: String,
    pub vm_id: Option<Uuid>,
}

pub struct AtomicWriter<N: NotificationPublisher> {
    pool: PgPool,
    notifier: N,
}

impl<N: NotificationPublisher> AtomicWriter<N> {
    pub fn new(pool: PgPool, notifier: N) -> Self {
        AtomicWriter { pool, notifier }
    }

    /// Exposes the shared publisher so a coordinator fanning out over many
    /// tickets (the batch aggregator, C9) can emit one notification for
    /// the whole batch instead of one per child.
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Spec §4.4 `ApproveCreateAndEnqueue`. Aborts and rolls back on the
    /// first failing step; nothing it touched is visible outside the
    /// transaction unless every step succeeds.
    pub async fn approve_create_and_enqueue(&self, input: ApproveCreateInput) -> EngineResult<ApprovedVm> {
        let cluster = ClusterStore::get(&self.pool, input.cluster_id).await?;
        let namespace = NamespaceStore::get_by_name(&self.pool, &input.namespace).await?;
        let instance_size = InstanceSizeStore::get(&self.pool, input.instance_size_id).await?;
        ApprovalValidator::validate(ValidationInput { cluster: &cluster, namespace: &namespace, instance_size: &instance_size })?;

        let mut tx = self.pool.begin().await?;

        let ticket_updated = ApprovalTicketStore::approve_create(
            &mut *tx,
            input.ticket_id,
            &input.approver,
            input.cluster_id,
            input.storage_class.as_deref(),
            input.template_version.as_deref(),
            input.template_snapshot.as_ref(),
            input.instance_size_snapshot.as_ref(),
            input.modified_spec.as_ref(),
        )
        .await?;
        if !ticket_updated {
            return Err(EngineError::new(ErrorCode::TicketNotPending, "not pending or operation type mismatch"));
        }

        let event_updated =
            DomainEventStore::set_status(&mut *tx, input.event_id, EventStatus::Pending, EventStatus::Processing).await?;
        if event_updated == 0 {
            return Err(EngineError::new(ErrorCode::InvalidStateTransition, "not pending or operation type mismatch"));
        }

        let AllocatedInstance { instance, service_name, system_name } =
            InstanceAllocator::allocate(&mut *tx, input.service_id).await?;
        let vm_name = build_vm_name(&input.namespace, &system_name, &service_name, &instance);

        let vm_id = Uuid::now_v7();
        VmStore::insert(
            &mut *tx,
            vm_id,
            &vm_name,
            &instance,
            &input.namespace,
            input.cluster_id,
            &input.requester_id,
            input.ticket_id,
            input.service_id,
        )
        .await?;

        JobQueue::enqueue(&mut *tx, &JobArgs::VmCreate(VmCreateArgs { event_id: input.event_id }), None).await?;

        AuditLog::record(
            &mut *tx,
            &input.approver,
            "approve_create",
            "approval_ticket",
            input.ticket_id,
            Some(serde_json::json!({"vm_id": vm_id, "vm_name": vm_name})),
        )
        .await?;

        tx.commit().await?;

        self.notifier.publish(NotificationTrigger::TicketApproved {
            ticket_id: input.ticket_id,
            requester: input.requester_id,
        });

        Ok(ApprovedVm { vm_id, vm_name })
    }

    /// Spec §4.4 `ApproveDeleteAndEnqueue`.
    pub async fn approve_delete_and_enqueue(&self, input: ApproveDeleteInput) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;

        let ticket_updated = ApprovalTicketStore::approve_delete(&mut *tx, input.ticket_id, &input.approver).await?;
        if !ticket_updated {
            return Err(EngineError::new(ErrorCode::TicketNotPending, "not pending or operation type mismatch"));
        }

        let event_updated =
            DomainEventStore::set_status(&mut *tx, input.event_id, EventStatus::Pending, EventStatus::Processing).await?;
        if event_updated == 0 {
            return Err(EngineError::new(ErrorCode::InvalidStateTransition, "not pending or operation type mismatch"));
        }

        if let Some(vm_id) = input.vm_id {
            VmStore::mark_deleting(&mut *tx, vm_id).await?;
        }

        JobQueue::enqueue(&mut *tx, &JobArgs::VmDelete(VmDeleteArgs { event_id: input.event_id }), None).await?;

        AuditLog::record(&mut *tx, &input.approver, "approve_delete", "approval_ticket", input.ticket_id, None).await?;

        tx.commit().await?;

        self.notifier.publish(NotificationTrigger::TicketStateChanged {
            ticket_id: input.ticket_id,
            requester: input.approver.clone(),
            status: "APPROVED".to_string(),
        });

        Ok(())
    }

    /// Rejection (spec §4.2/§4.1): moves the ticket `PENDING -> REJECTED`
    /// and its underlying event `PENDING -> CANCELLED` in the same
    /// transaction, so a ticket is never left pointing at a still-pending
    /// event. Not named in §4.4 but holds to the same all-or-nothing
    /// discipline for the same reason.
    pub async fn reject_and_cancel_event(
        &self,
        ticket_id: Uuid,
        event_id: Uuid,
        approver: &str,
        reject_reason: &str,
    ) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;

        ApprovalTicketStore::reject(&mut *tx, ticket_id, approver, reject_reason).await?;
        DomainEventStore::set_status(&mut *tx, event_id, EventStatus::Pending, EventStatus::Cancelled).await?;
        AuditLog::record(
            &mut *tx,
            approver,
            "reject",
            "approval_ticket",
            ticket_id,
            Some(serde_json::json!({"reject_reason": reject_reason})),
        )
        .await?;

        tx.commit().await?;

        self.notifier.publish(NotificationTrigger::TicketRejected {
            ticket_id,
            requester: approver.to_string(),
            reason: reject_reason.to_string(),
        });
        Ok(())
    }

    /// Requester-initiated cancellation (spec §4.2/§4.1), same coupling as
    /// rejection.
    pub async fn cancel_and_cancel_event(&self, ticket_id: Uuid, event_id: Uuid, caller: &str, requester: &str) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;

        ApprovalTicketStore::cancel(&mut *tx, ticket_id, caller, requester).await?;
        DomainEventStore::set_status(&mut *tx, event_id, EventStatus::Pending, EventStatus::Cancelled).await?;
        AuditLog::record(&mut *tx, caller, "cancel", "approval_ticket", ticket_id, None).await?;

        tx.commit().await?;
        Ok(())
    }

    /// No approval ticket governs power actions on an already-provisioned
    /// VM (spec §4.5), so submission and "approval" collapse into one
    /// step: append the event already `PROCESSING` and enqueue the job in
    /// the same transaction, same atomicity guarantee as the ticketed
    /// paths.
    pub async fn submit_vm_power(
        &self,
        vm_id: Uuid,
        cluster_id: Uuid,
        namespace: &str,
        action: PowerAction,
        actor: &str,
    ) -> EngineResult<Uuid> {
        let mut tx = self.pool.begin().await?;

        let payload = EventPayload::VmPower(VmPowerPayload {
            vm_id,
            cluster_id,
            namespace: namespace.to_string(),
            action: action.to_string(),
            actor: actor.to_string(),
        });
        let event_id = DomainEventStore::append(&mut *tx, EventType::VmPowerRequested, "vm", vm_id, &payload, actor).await?;
        let transitioned = DomainEventStore::set_status(&mut *tx, event_id, EventStatus::Pending, EventStatus::Processing).await?;
        if transitioned == 0 {
            return Err(EngineError::internal("freshly appended power event failed to reach processing"));
        }

        JobQueue::enqueue(&mut *tx, &JobArgs::VmPower(VmPowerArgs { event_id, action }), None).await?;
        AuditLog::record(&mut *tx, actor, "submit_vm_power", "vm", vm_id, Some(serde_json::json!({"action": action.to_string()}))).await?;

        tx.commit().await?;
        Ok(event_id)
    }

    /// VNC approval (spec §4.4): flips ticket/event straight to their
    /// terminal-for-this-operation states and records an audit entry. No
    /// job is enqueued — token issuance happens synchronously on a later
    /// read path, out of scope for this crate.
    pub async fn approve_vnc(&self, ticket_id: Uuid, event_id: Uuid, approver: &str) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;

        let ticket_updated = ApprovalTicketStore::approve_vnc(&mut *tx, ticket_id, approver).await?;
        if !ticket_updated {
            return Err(EngineError::new(ErrorCode::TicketNotPending, "not pending or operation type mismatch"));
        }

        let event_updated = DomainEventStore::set_status(&mut *tx, event_id, EventStatus::Pending, EventStatus::Processing).await?;
        if event_updated == 0 {
            return Err(EngineError::new(ErrorCode::InvalidStateTransition, "not pending or operation type mismatch"));
        }
        let completed = DomainEventStore::set_status(&mut *tx, event_id, EventStatus::Processing, EventStatus::Completed).await?;
        if completed == 0 {
            return Err(EngineError::internal("vnc event failed to reach completed"));
        }

        AuditLog::record(&mut *tx, approver, "approve_vnc", "approval_ticket", ticket_id, None).await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Builds the canonical CREATE event payload persisted at intake time
/// (spec §4.1), reused here only for tests that need a round-trippable
/// fixture.
pub fn creation_payload(
    service_id: Uuid,
    template_id: Uuid,
    instance_size_id: Uuid,
    namespace: &str,
    reason: &str,
    requester_id: &str,
) -> EventPayload {
    EventPayload::VmCreation(VmCreationPayload {
        service_id,
        template_id,
        instance_size_id,
        namespace: namespace.to_string(),
        reason: reason.to_string(),
        requester_id: requester_id.to_string(),
    })
}

pub fn delete_payload(vm_id: Uuid, vm_name: &str, cluster_id: Uuid, namespace: &str, actor: &str) -> EventPayload {
    EventPayload::VmDelete(VmDeletePayload {
        vm_id,
        vm_name: vm_name.to_string(),
        cluster_id,
        namespace: namespace.to_string(),
        actor: actor.to_string(),
    })
}

/// `#[sqlx::test]`-style integration coverage (SPEC_FULL.md §F), gated
/// behind `DATABASE_URL` since no live Postgres is available in this
/// exercise. Exercises P2 directly: a validator-rejected approval must
/// leave no ticket/event/VM/job row behind.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClusterStatus, Environment, TicketStatus};

    struct Fixture {
        cluster_id: Uuid,
        service_id: Uuid,
        event_id: Uuid,
        ticket_id: Uuid,
        instance_size_id: Uuid,
        namespace: String,
    }

    async fn seed(pool: &PgPool, cluster_status: ClusterStatus) -> Fixture {
        let cluster_id = Uuid::now_v7();
        sqlx::query(
            r#"INSERT INTO clusters (id, name, api_server_url, encrypted_kubeconfig, status, environment, enabled_features, enabled)
               VALUES ($1, $2, 'https://example.test', '', $3, $4, '[]', true)"#,
        )
        .bind(cluster_id)
        .bind(format!("cl-{cluster_id}"))
        .bind(cluster_status)
        .bind(Environment::Test)
        .execute(pool)
        .await
        .unwrap();

        let namespace = format!("ns-{}", Uuid::now_v7());
        sqlx::query(r#"INSERT INTO namespace_registry (name, environment, enabled) VALUES ($1, $2, true)"#)
            .bind(&namespace)
            .bind(Environment::Test)
            .execute(pool)
            .await
            .unwrap();

        let instance_size_id = Uuid::now_v7();
        sqlx::query(
            r#"INSERT INTO instance_sizes
                (id, name, cpu_cores, memory_mb, disk_gb, cpu_request, memory_request_mb,
                 requires_gpu, requires_sriov, requires_hugepages, hugepages_size, dedicated_cpu, spec_overrides)
               VALUES ($1, $2, 2.0, 2048, NULL, NULL, NULL, false, false, false, NULL, false, '{}')"#,
        )
        .bind(instance_size_id)
        .bind(format!("sz-{instance_size_id}"))
        .execute(pool)
        .await
        .unwrap();

        let system_id = Uuid::now_v7();
        sqlx::query(r#"INSERT INTO systems (id, name, created_at) VALUES ($1, $2, now())"#)
            .bind(system_id)
            .bind(format!("sys-{system_id}"))
            .execute(pool)
            .await
            .unwrap();

        let service_id = Uuid::now_v7();
        sqlx::query(r#"INSERT INTO services (id, system_id, name, next_instance_index, created_at) VALUES ($1, $2, $3, 0, now())"#)
            .bind(service_id)
            .bind(system_id)
            .bind(format!("svc-{service_id}"))
            .execute(pool)
            .await
            .unwrap();

        let payload = creation_payload(service_id, Uuid::now_v7(), instance_size_id, &namespace, "test", "u1");
        let event_id = DomainEventStore::append(pool, EventType::VmCreationRequested, "service", service_id, &payload, "u1")
            .await
            .unwrap();
        let ticket_id = ApprovalTicketStore::create(pool, event_id, crate::models::OperationType::Create, "u1", None, None)
            .await
            .unwrap();

        Fixture { cluster_id, service_id, event_id, ticket_id, instance_size_id, namespace }
    }

    fn approve_input(fixture: &Fixture) -> ApproveCreateInput {
        ApproveCreateInput {
            ticket_id: fixture.ticket_id,
            event_id: fixture.event_id,
            approver: "admin".to_string(),
            cluster_id: fixture.cluster_id,
            storage_class: None,
            service_id: fixture.service_id,
            namespace: fixture.namespace.clone(),
            requester_id: "u1".to_string(),
            instance_size_id: fixture.instance_size_id,
            template_version: None,
            template_snapshot: None,
            instance_size_snapshot: None,
            modified_spec: None,
        }
    }

    #[tokio::test]
    async fn approve_create_commits_ticket_event_vm_and_job_together() {
        let Some(pool) = crate::test_util::pool().await else { return };
        let fixture = seed(&pool, ClusterStatus::Healthy).await;
        let writer = AtomicWriter::new(pool.clone(), crate::notifier::NullNotificationPublisher);

        let approved = writer.approve_create_and_enqueue(approve_input(&fixture)).await.unwrap();

        let ticket = ApprovalTicketStore::get(&pool, fixture.ticket_id).await.unwrap();
        assert_eq!(ticket.status, TicketStatus::Approved);
        let vm = VmStore::get(&pool, approved.vm_id).await.unwrap();
        assert_eq!(vm.name, approved.vm_name);
    }

    #[tokio::test]
    async fn validator_rejection_leaves_no_side_effects() {
        let Some(pool) = crate::test_util::pool().await else { return };
        let fixture = seed(&pool, ClusterStatus::Unhealthy).await;
        let writer = AtomicWriter::new(pool.clone(), crate::notifier::NullNotificationPublisher);

        let err = writer.approve_create_and_enqueue(approve_input(&fixture)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ClusterUnhealthy);

        let ticket = ApprovalTicketStore::get(&pool, fixture.ticket_id).await.unwrap();
        assert_eq!(ticket.status, TicketStatus::Pending, "validator rejection must not touch the ticket");
        let event = DomainEventStore::get(&pool, fixture.event_id).await.unwrap();
        assert_eq!(event.status, EventStatus::Pending, "validator rejection must not touch the event");
    }
}
