//! C11: fire-and-forget in-process notification triggers on approve/
//! reject/state-change. Grounded directly on the teacher's
//! `msg_publisher.rs` (`MsgPublisher` trait, `UnboundedSender` impl,
//! no-op `StdMsgPublisher` default), generalized from one engine message
//! payload to the trigger kinds this pipeline fires.

use sqlx::PgPool;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::store::NotificationStore;

#[derive(Debug, Clone)]
pub enum NotificationTrigger {
    TicketApproved { ticket_id: Uuid, requester: String },
    TicketRejected { ticket_id: Uuid, requester: String, reason: String },
    TicketStateChanged { ticket_id: Uuid, requester: String, status: String },
    BatchCompleted { batch_id: Uuid, created_by: String, status: String },
}

impl NotificationTrigger {
    fn recipient(&self) -> &str {
        match self {
            NotificationTrigger::TicketApproved { requester, .. } => requester,
            NotificationTrigger::TicketRejected { requester, .. } => requester,
            NotificationTrigger::TicketStateChanged { requester, .. } => requester,
            NotificationTrigger::BatchCompleted { created_by, .. } => created_by,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            NotificationTrigger::TicketApproved { .. } => "TICKET_APPROVED",
            NotificationTrigger::TicketRejected { .. } => "TICKET_REJECTED",
            NotificationTrigger::TicketStateChanged { .. } => "TICKET_STATE_CHANGED",
            NotificationTrigger::BatchCompleted { .. } => "BATCH_COMPLETED",
        }
    }

    fn resource_id(&self) -> Uuid {
        match self {
            NotificationTrigger::TicketApproved { ticket_id, .. } => *ticket_id,
            NotificationTrigger::TicketRejected { ticket_id, .. } => *ticket_id,
            NotificationTrigger::TicketStateChanged { ticket_id, .. } => *ticket_id,
            NotificationTrigger::BatchCompleted { batch_id, .. } => *batch_id,
        }
    }

    fn message(&self) -> String {
        match self {
            NotificationTrigger::TicketApproved { ticket_id, .. } => format!("ticket {ticket_id} approved"),
            NotificationTrigger::TicketRejected { ticket_id, reason, .. } => format!("ticket {ticket_id} rejected: {reason}"),
            NotificationTrigger::TicketStateChanged { ticket_id, status, .. } => format!("ticket {ticket_id} is now {status}"),
            NotificationTrigger::BatchCompleted { batch_id, status, .. } => format!("batch {batch_id} finished: {status}"),
        }
    }
}

pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, trigger: NotificationTrigger);
    fn clone_dyn(&self) -> Box<dyn NotificationPublisher>;
}

impl NotificationPublisher for UnboundedSender<NotificationTrigger> {
    fn publish(&self, trigger: NotificationTrigger) {
        if self.send(trigger).is_err() {
            tracing::error!("unable to send notification trigger: receiver dropped");
        }
    }

    fn clone_dyn(&self) -> Box<dyn NotificationPublisher> {
        Box::new(self.clone())
    }
}

/// No-op default, used wherever a caller doesn't care about the
/// notification sender (out of scope per spec §1) — mirrors
/// `StdMsgPublisher`.
#[derive(Clone, Default)]
pub struct NullNotificationPublisher;

impl NotificationPublisher for NullNotificationPublisher {
    fn publish(&self, _trigger: NotificationTrigger) {}

    fn clone_dyn(&self) -> Box<dyn NotificationPublisher> {
        Box::new(self.clone())
    }
}

/// Drains the channel side of an `UnboundedSender<NotificationTrigger>`
/// publisher into the persisted inbox (`NotificationStore`) that
/// `NotificationCleanup` later purges by retention. Library exposes the
/// loop; the composition root owns spawning it, the same split as
/// [`crate::worker::WorkerRuntime::run`].
pub struct NotificationInboxWriter {
    pool: PgPool,
    receiver: UnboundedReceiver<NotificationTrigger>,
}

impl NotificationInboxWriter {
    pub fn new(pool: PgPool, receiver: UnboundedReceiver<NotificationTrigger>) -> Self {
        NotificationInboxWriter { pool, receiver }
    }

    /// Runs until every sender clone is dropped.
    pub async fn run(mut self) {
        while let Some(trigger) = self.receiver.recv().await {
            let result = NotificationStore::insert(
                &self.pool,
                trigger.recipient(),
                trigger.kind(),
                &trigger.message(),
                Some(trigger.resource_id()),
            )
            .await;
            if let Err(err) = result {
                tracing::error!(error = %err, "failed to persist notification trigger");
            }
        }
    }
}
