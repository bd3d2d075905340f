use thiserror::Error as ThisError;

/// Machine-readable error kinds surfaced to admin tooling.
///
/// The admin UI renders the kind plus the human-readable message and must
/// never show a success state after receiving one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Invalid,
    Conflict,
    PermissionDenied,
    Unavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Conflict => "conflict",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::Unavailable => "unavailable",
        }
    }
}

/// Error taxonomy for engine operations.
///
/// Transient store write conflicts are retried internally up to a fixed
/// bound; every variant below is terminal for the current call and leaves
/// the store in its pre-call state.
#[derive(Debug, ThisError)]
pub enum EngineError {
    /// Tournament, account, ledger row, or withdrawal request does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rejected input or state: negative kill count, prize edit on an
    /// unlinked participant, insufficient balance for a user-initiated
    /// debit, hold transition from a non-hold row.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Optimistic retry budget exhausted on a contended key. The operator
    /// should retry the action.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Propagated unchanged from the backing store's access-control layer.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Transient backing-store failure (e.g. request timeout).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Invalid(_) => ErrorKind::Invalid,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            EngineError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }
}
