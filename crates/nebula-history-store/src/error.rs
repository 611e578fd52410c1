//! Error types for the store module.

use nebula_history_core::{EventType, InstanceId, RegistrationId};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The instance has no events and the event cannot establish it.
    #[error("instance {instance} has no registration linkage; {event_type} cannot open it")]
    UnknownRegistration {
        instance: InstanceId,
        event_type: EventType,
    },

    /// A second WorkflowScheduled or WorkflowCompleted for one instance.
    #[error("instance {instance} already has a {event_type} event")]
    DuplicateLifecycleEvent {
        instance: InstanceId,
        event_type: EventType,
    },

    /// WorkflowCompleted before any WorkflowScheduled.
    #[error("instance {instance} cannot complete before it is scheduled")]
    OutOfOrderEvent { instance: InstanceId },

    /// The event names a different registration than the one recorded.
    #[error("instance {instance} belongs to {recorded}, not {requested}")]
    RegistrationMismatch {
        instance: InstanceId,
        recorded: RegistrationId,
        requested: RegistrationId,
    },

    /// Registration and instance ids embed different access scopes.
    #[error("registration {registration} and instance {instance} carry different scopes")]
    ScopeMismatch {
        registration: RegistrationId,
        instance: InstanceId,
    },

    /// A batch append named more than one instance.
    #[error("batch appends to {first} and {other}; a batch targets one instance")]
    MixedBatch { first: InstanceId, other: InstanceId },

    /// Instance has no recorded events.
    #[error("instance not found: {0}")]
    NotFound(InstanceId),

    /// The storage collaborator could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the failure came from the collaborator rather than the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::Database(_) | StoreError::Unavailable(_) | StoreError::Io(_)
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
