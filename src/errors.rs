//! Stable, machine-readable error codes for the approval-to-execution
//! pipeline. Every fallible public operation returns [`EngineError`];
//! user-facing text is rendered by the caller from [`ErrorCode`], never
//! hard-coded here.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Machine codes per spec §7. Non-exhaustive by design: callers must match
/// with a wildcard arm so new codes don't break downstream renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum ErrorCode {
    VmNotFound,
    TicketNotFound,
    EventNotFound,
    ClusterNotFound,
    NamespaceNotFound,
    InstanceSizeNotFound,
    TicketNotPending,
    TicketCancelForbidden,
    DuplicateRequest,
    VmNotDeletable,
    InvalidStateTransition,
    ConfirmationNameMismatch,
    DeleteConfirmationRequired,
    ValidationFailed,
    NamespaceClusterEnvMismatch,
    DedicatedCpuOvercommitConflict,
    OvercommitInvalid,
    ClusterUnhealthy,
    NamespacePermissionDenied,
    RateLimitExceeded,
    ApprovalRequired,
    Internal,
}

impl ErrorCode {
    /// Stable wire identifier, e.g. for embedding in audit rows or HTTP
    /// error bodies at the (out of scope) edge.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::VmNotFound => "VM_NOT_FOUND",
            ErrorCode::TicketNotFound => "TICKET_NOT_FOUND",
            ErrorCode::EventNotFound => "EVENT_NOT_FOUND",
            ErrorCode::ClusterNotFound => "CLUSTER_NOT_FOUND",
            ErrorCode::NamespaceNotFound => "NAMESPACE_NOT_FOUND",
            ErrorCode::InstanceSizeNotFound => "INSTANCE_SIZE_NOT_FOUND",
            ErrorCode::TicketNotPending => "TICKET_NOT_PENDING",
            ErrorCode::TicketCancelForbidden => "TICKET_CANCEL_FORBIDDEN",
            ErrorCode::DuplicateRequest => "DUPLICATE_REQUEST",
            ErrorCode::VmNotDeletable => "VM_NOT_DELETABLE",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::ConfirmationNameMismatch => "CONFIRMATION_NAME_MISMATCH",
            ErrorCode::DeleteConfirmationRequired => "DELETE_CONFIRMATION_REQUIRED",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::NamespaceClusterEnvMismatch => "NAMESPACE_CLUSTER_ENV_MISMATCH",
            ErrorCode::DedicatedCpuOvercommitConflict => "DEDICATED_CPU_OVERCOMMIT_CONFLICT",
            ErrorCode::OvercommitInvalid => "OVERCOMMIT_INVALID",
            ErrorCode::ClusterUnhealthy => "CLUSTER_UNHEALTHY",
            ErrorCode::NamespacePermissionDenied => "NAMESPACE_PERMISSION_DENIED",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::ApprovalRequired => "APPROVAL_REQUIRED",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The top-level error type returned by every store/validator/atomic-writer/
/// worker operation. Carries a stable code, a caller-safe message, an
/// optional structured parameter map (e.g. `existing_ticket_id`,
/// `missing_capabilities`) and, for internal diagnosis only, a causal
/// source that is never rendered to end users.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct EngineError {
    pub code: ErrorCode,
    pub message: String,
    pub params: BTreeMap<String, String>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl EngineError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        EngineError {
            code,
            message: message.into(),
            params: BTreeMap::new(),
            source: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Internal invariant violations are logged in full (via `tracing`,
    /// left to the caller) but surfaced to end users as a generic code,
    /// per spec §7.
    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::new(ErrorCode::Internal, message)
    }

    pub fn ticket_not_pending(current: impl Display) -> Self {
        EngineError::new(
            ErrorCode::TicketNotPending,
            format!("ticket is not pending (current: {current})"),
        )
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::internal(format!("storage error: {err}")).with_source(err)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
