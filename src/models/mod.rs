pub mod audit;
pub mod batch;
pub mod cluster;
pub mod instance_size;
pub mod namespace;
pub mod notification;
pub mod rate_limit;
pub mod service;
pub mod ticket;
pub mod vm;

pub use audit::AuditLogEntry;
pub use batch::{BatchApprovalTicket, BatchStatus, BatchType};
pub use cluster::{Cluster, ClusterStatus, Environment};
pub use instance_size::InstanceSize;
pub use namespace::NamespaceRegistry;
pub use notification::Notification;
pub use rate_limit::{RateLimitExemption, RateLimitOverride};
pub use service::{Service, System};
pub use ticket::{ApprovalTicket, OperationType, TicketStatus};
pub use vm::{Vm, VmStatus};
