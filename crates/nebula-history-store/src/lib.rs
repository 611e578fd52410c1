//! # Nebula History Store
//!
//! Storage abstraction for workflow event history. Provides a trait-based
//! interface with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store abstracts history persistence behind the [`EventStore`] trait,
//! allowing the history service to be storage-agnostic. The primary
//! implementation is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`EventStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`Page`] - Offset+limit window for paged queries
//! - [`HistoryCursor`] - Lazy, restartable paging over one instance
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nebula_history_core::{AccessScope, EventType, InstanceId, NewEvent, RegistrationId};
//! use nebula_history_store::{EventStore, Page, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("history.db").unwrap();
//!
//!     let scope = AccessScope::new("acc1").unwrap();
//!     let registration = RegistrationId::derive(&scope, "order", "1.0");
//!     let instance = InstanceId::generate(&scope);
//!
//!     store
//!         .insert_event(NewEvent::new(
//!             registration,
//!             instance.clone(),
//!             EventType::WorkflowScheduled,
//!             b"input".to_vec(),
//!         ))
//!         .await
//!         .unwrap();
//!
//!     let events = store.list_by_instance(&instance, Page::first(50)).await.unwrap();
//!     assert_eq!(events.len(), 1);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Append-only**: no update or delete operations exist
//! - **Lifecycle invariants**: at most one `WorkflowScheduled` and one
//!   `WorkflowCompleted` per instance, Scheduled first
//! - **Registration linkage**: fixed by the instance's first event
//! - **Atomic batches**: `insert_events` lands every event of a batch or none
//! - **Stateless pagination**: every paged call carries its own window

pub mod append;
pub mod cursor;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use append::{check_append, check_batch, InstanceHead};
pub use cursor::HistoryCursor;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::{SqliteConfig, SqliteStore};
pub use traits::{EventStore, Page};
