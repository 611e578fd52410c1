//! # Nebula History
//!
//! Durable, append-only event history for workflow executions, with every
//! access gated by the scope embedded in the identifiers it names.
//!
//! ## Overview
//!
//! - **Events**: typed, immutable entries in one instance's history
//! - **Instances**: one run of a registered workflow, opened by its
//!   `WorkflowScheduled` event and closed by at most one `WorkflowCompleted`
//! - **Scopes**: every registration and instance id is `<scope>:<local>`;
//!   a caller may only touch ids carrying the scope it claims
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nebula_history::{History, HistoryConfig};
//! use nebula_history::gate::{GetEventsRequest, ScheduleWorkflowRequest};
//! use nebula_history::store::SqliteStore;
//!
//! async fn example() -> nebula_history::Result<()> {
//!     let store = SqliteStore::open("history.db").unwrap();
//!     let history = History::new(store, HistoryConfig::default());
//!
//!     history
//!         .schedule_workflow(ScheduleWorkflowRequest {
//!             access_id: "acc1".into(),
//!             registration_id: "acc1:order".into(),
//!             instance_id: "acc1:run-1".into(),
//!             input: b"{}".to_vec(),
//!         })
//!         .await?;
//!
//!     let page = history
//!         .get_events(GetEventsRequest {
//!             access_id: "acc1".into(),
//!             registration_id: "acc1:order".into(),
//!             instance_id: "acc1:run-1".into(),
//!             ..Default::default()
//!         })
//!         .await?;
//!     assert_eq!(page.total, 1);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `nebula_history::core` - identifiers, codec, events
//! - `nebula_history::store` - storage trait, SQLite and in-memory stores
//! - `nebula_history::gate` - request types and the admission gate

pub mod config;
pub mod error;
pub mod history;

pub use nebula_history_core as core;
pub use nebula_history_gate as gate;
pub use nebula_history_store as store;

pub use config::HistoryConfig;
pub use error::{HistoryError, Result};
pub use history::{EventPage, History, InstancePage, TaskRecord, WorkflowStatus};

pub use nebula_history_core::{
    AccessScope, Event, EventType, InstanceId, LifecycleState, NewEvent, RegistrationId,
};
