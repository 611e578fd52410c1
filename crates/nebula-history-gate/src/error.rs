//! Error types for the gate.

use nebula_history_core::CoreError;
use thiserror::Error;

use crate::gate::GateState;
use crate::request::RequestKind;

/// Reasons a request is rejected before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// A required field is missing or blank. Carries the wire name.
    #[error("invalid request: {field} should not be empty")]
    InvalidRequest { field: &'static str },

    /// The request kind has no rule set.
    #[error("unsupported request kind: {0:?}")]
    UnsupportedRequest(RequestKind),

    /// An identifier could not be decoded.
    #[error("malformed {field}: {source}")]
    MalformedIdentifier {
        field: &'static str,
        #[source]
        source: CoreError,
    },

    /// The identifiers presented do not belong to the caller's scope.
    #[error("no authorization for the request")]
    Unauthorized,
}

impl GateError {
    /// The state the request was in when it was rejected.
    pub fn rejected_from(&self) -> GateState {
        match self {
            GateError::InvalidRequest { .. } | GateError::UnsupportedRequest(_) => {
                GateState::Received
            }
            GateError::MalformedIdentifier { .. } | GateError::Unauthorized => {
                GateState::StructurallyValid
            }
        }
    }
}

/// Result type for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;
