//! # Nebula History Core
//!
//! Pure primitives for Nebula workflow history: scoped identifiers, events,
//! and lifecycle derivation.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`AccessScope`] - The tenant token embedded in every identifier
//! - [`RegistrationId`] - Identifies a workflow registration
//! - [`InstanceId`] - Identifies one workflow execution
//! - [`Event`] / [`NewEvent`] - A stored history record and its unsequenced form
//! - [`EventType`] - Discriminator for history records
//! - [`LifecycleState`] - Running/Completed, computed from lifecycle events
//!
//! ## Identifier Scheme
//!
//! Identifiers have the form `<scope>:<local>`. See the [`codec`] module.

pub mod codec;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod types;

pub use codec::{encode, extract_access_scope, DELIMITER};
pub use error::{CoreError, Result};
pub use event::{Event, EventType, NewEvent, ALL_EVENT_TYPES};
pub use lifecycle::LifecycleState;
pub use types::{AccessScope, InstanceId, RegistrationId};
