//! Persistence layer: C1-C4, C9-C12 plus the duplicate request guard.
//! Every store function is generic over `sqlx::Executor` so the atomic
//! writer (C6) can run a sequence of them inside one open transaction.

pub mod approval_ticket_store;
pub mod audit_log;
pub mod batch_store;
pub mod cluster_store;
pub mod domain_event_store;
pub mod duplicate_guard;
pub mod instance_allocator;
pub mod instance_size_store;
pub mod namespace_store;
pub mod notification_store;
pub mod rate_limit_store;
pub mod vm_store;

pub use approval_ticket_store::ApprovalTicketStore;
pub use audit_log::AuditLog;
pub use batch_store::BatchStore;
pub use cluster_store::ClusterStore;
pub use domain_event_store::DomainEventStore;
pub use duplicate_guard::DuplicateGuard;
pub use instance_allocator::{AllocatedInstance, InstanceAllocator};
pub use instance_size_store::InstanceSizeStore;
pub use namespace_store::NamespaceStore;
pub use notification_store::NotificationStore;
pub use rate_limit_store::RateLimitStore;
pub use vm_store::VmStore;
