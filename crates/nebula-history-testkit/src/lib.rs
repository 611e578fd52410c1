//! # Nebula History Testkit
//!
//! Testing utilities for Nebula history.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: one scope and registration with builders for ids, events
//!   and gate requests
//! - **Generators**: proptest strategies for identifiers, event types and
//!   random insert sequences
//!
//! ## Test Fixtures
//!
//! ```rust
//! use nebula_history_testkit::HistoryFixture;
//!
//! let fixture = HistoryFixture::new("acc1");
//! let instance = fixture.instance("run-1");
//! let event = fixture.scheduled(&instance, b"input");
//! assert_eq!(event.instance_id, instance);
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use nebula_history_testkit::generators::insert_ops;
//!
//! proptest! {
//!     #[test]
//!     fn lifecycle_holds(ops in insert_ops(4, 40)) {
//!         // replay ops against a store and check the invariant
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{multi_scope_fixtures, HistoryFixture};
pub use generators::{insert_ops, InsertOp};
