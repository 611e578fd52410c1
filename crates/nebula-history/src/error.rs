//! Error taxonomy for the history service.
//!
//! Gate and store errors are folded into one enum so callers match on a
//! single type. Storage internals never leak: every collaborator failure
//! becomes [`HistoryError::StoreUnavailable`].

use nebula_history_core::{CoreError, EventType, InstanceId, RegistrationId};
use nebula_history_gate::{GateError, RequestKind};
use nebula_history_store::StoreError;
use thiserror::Error;

/// Errors returned by [`History`](crate::History) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// A required request field is missing or blank.
    #[error("invalid request: {0} should not be empty")]
    InvalidRequest(&'static str),

    /// The request kind is not covered by the gate's rule table.
    #[error("unsupported request kind: {0:?}")]
    UnsupportedRequest(RequestKind),

    /// An identifier could not be decoded.
    #[error("malformed {field}: {reason}")]
    MalformedIdentifier { field: &'static str, reason: String },

    #[error("no authorization for the request")]
    Unauthorized,

    #[error("instance {instance} has no registration linkage; {event_type} cannot open it")]
    UnknownRegistration {
        instance: InstanceId,
        event_type: EventType,
    },

    #[error("instance {instance} already has a {event_type} event")]
    DuplicateLifecycleEvent {
        instance: InstanceId,
        event_type: EventType,
    },

    #[error("instance {0} cannot complete before it is scheduled")]
    OutOfOrderEvent(InstanceId),

    #[error("instance {instance} belongs to {recorded}, not {requested}")]
    RegistrationMismatch {
        instance: InstanceId,
        recorded: RegistrationId,
        requested: RegistrationId,
    },

    #[error("registration {registration} and instance {instance} carry different scopes")]
    ScopeMismatch {
        registration: RegistrationId,
        instance: InstanceId,
    },

    #[error("instance not found: {0}")]
    NotFound(InstanceId),

    /// One atomic append named several instances.
    #[error("batch appends to {first} and {other}; a batch targets one instance")]
    MixedBatch { first: InstanceId, other: InstanceId },

    /// The store failed or timed out. The only retryable error.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A payload could not be encoded.
    #[error("payload error: {0}")]
    Payload(String),
}

impl HistoryError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HistoryError::StoreUnavailable(_))
    }
}

impl From<GateError> for HistoryError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::InvalidRequest { field } => HistoryError::InvalidRequest(field),
            GateError::UnsupportedRequest(kind) => HistoryError::UnsupportedRequest(kind),
            GateError::MalformedIdentifier { field, source } => HistoryError::MalformedIdentifier {
                field,
                reason: source.to_string(),
            },
            GateError::Unauthorized => HistoryError::Unauthorized,
        }
    }
}

impl From<StoreError> for HistoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownRegistration {
                instance,
                event_type,
            } => HistoryError::UnknownRegistration {
                instance,
                event_type,
            },
            StoreError::DuplicateLifecycleEvent {
                instance,
                event_type,
            } => HistoryError::DuplicateLifecycleEvent {
                instance,
                event_type,
            },
            StoreError::OutOfOrderEvent { instance } => HistoryError::OutOfOrderEvent(instance),
            StoreError::RegistrationMismatch {
                instance,
                recorded,
                requested,
            } => HistoryError::RegistrationMismatch {
                instance,
                recorded,
                requested,
            },
            StoreError::ScopeMismatch {
                registration,
                instance,
            } => HistoryError::ScopeMismatch {
                registration,
                instance,
            },
            StoreError::NotFound(instance) => HistoryError::NotFound(instance),
            StoreError::MixedBatch { first, other } => HistoryError::MixedBatch { first, other },
            StoreError::Database(_)
            | StoreError::Unavailable(_)
            | StoreError::InvalidData(_)
            | StoreError::Migration(_)
            | StoreError::Io(_) => HistoryError::StoreUnavailable(err.to_string()),
        }
    }
}

impl From<CoreError> for HistoryError {
    fn from(err: CoreError) -> Self {
        HistoryError::Payload(err.to_string())
    }
}

/// Result type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;
