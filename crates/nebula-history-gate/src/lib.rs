//! # Nebula History Gate
//!
//! Admission control for history requests. Every request passes two checks
//! before it may touch the store.
//!
//! ## Overview
//!
//! 1. **Structural**: the request kind's rule set lists the fields that must
//!    be present and non-blank. The first failing field rejects the request.
//! 2. **Authorization**: the scope the caller claims in `accessId` must equal
//!    the scope embedded in every identifier the request carries.
//!
//! There is no separate permission store; ownership is read straight out of
//! the identifiers.
//!
//! ## Usage
//!
//! ```rust
//! use nebula_history_gate::{Gate, GateError, ScheduleWorkflowRequest};
//!
//! let gate = Gate::new();
//!
//! let ok = ScheduleWorkflowRequest {
//!     access_id: "acc1".into(),
//!     registration_id: "acc1:order".into(),
//!     instance_id: "acc1:run-1".into(),
//!     input: Vec::new(),
//! };
//! assert!(gate.admit(ok).is_ok());
//!
//! let foreign = ScheduleWorkflowRequest {
//!     access_id: "acc1".into(),
//!     registration_id: "acc1:order".into(),
//!     instance_id: "acc2:run-1".into(),
//!     input: Vec::new(),
//! };
//! assert_eq!(gate.admit(foreign).unwrap_err(), GateError::Unauthorized);
//! ```

pub mod error;
pub mod gate;
pub mod request;
pub mod rules;

pub use error::{GateError, Result};
pub use gate::{Admitted, Gate, GateState};
pub use request::{
    ActivityOutcome, CompleteActivityRequest, CompleteDecisionRequest, DecisionOutcome, Field,
    GetEventsRequest, GetInstancesRequest, GetWorkflowStatusRequest, Request, RequestKind,
    ScheduleWorkflowRequest,
};
pub use rules::{rules_for, Check, FieldRule, RuleSet, DEFAULT_RULES};
