//! Store trait: the abstract interface for event history persistence.
//!
//! This trait allows the history service to be storage-agnostic.
//! Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use nebula_history_core::{Event, InstanceId, NewEvent, RegistrationId};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An offset+limit window over a stable sort key.
///
/// Pages are stateless: each fetch is an independent request, so a caller
/// may stop between pages at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
    /// Rows to skip.
    pub offset: u64,
    /// Maximum rows to return. Zero yields an empty page.
    pub limit: u32,
}

impl Page {
    pub const fn new(offset: u64, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// The first page of the given size.
    pub const fn first(limit: u32) -> Self {
        Self { offset: 0, limit }
    }

    /// The page immediately after this one.
    pub const fn next(self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit as u64),
            limit: self.limit,
        }
    }

    /// Apply this window to an ordered iterator.
    pub fn apply<T>(self, iter: impl Iterator<Item = T>) -> Vec<T> {
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        iter.skip(offset).take(self.limit as usize).collect()
    }
}

/// The Store trait: async interface for event history persistence.
///
/// # Design Notes
///
/// - **Append-only**: there is no update or delete.
/// - **Per-instance atomicity**: concurrent inserts for one instance are
///   serialized; the loser of a lifecycle race gets the invariant error.
/// - **Bounded appends**: an append either commits or fails within the
///   backend's own time limit. A failure reported as `Unavailable` wrote
///   nothing, so callers must not abandon an append future to impose a
///   shorter bound; dropping it does not cancel the write.
/// - **Reads never block writers**: reads do not take the append path's
///   exclusive locks.
/// - **Stateless pagination**: every paged call carries its own [`Page`].
#[async_trait]
pub trait EventStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Append
    // ─────────────────────────────────────────────────────────────────────────

    /// Append one event, assigning the next sequence number for its instance.
    ///
    /// # Errors
    /// - `OutOfOrderEvent` if a `WorkflowCompleted` arrives before any
    ///   `WorkflowScheduled`.
    /// - `UnknownRegistration` if the instance has no events and the event is
    ///   not a `WorkflowScheduled`.
    /// - `DuplicateLifecycleEvent` on a second Scheduled or Completed.
    /// - `RegistrationMismatch` / `ScopeMismatch` on inconsistent ids.
    async fn insert_event(&self, event: NewEvent) -> Result<Event>;

    /// Append several events to one instance atomically, in order.
    ///
    /// Each event is checked as if the earlier ones had already landed; if
    /// any is rejected, none is stored. An empty batch is a no-op.
    ///
    /// # Errors
    /// As [`insert_event`](Self::insert_event), plus `MixedBatch` when the
    /// events name more than one instance.
    async fn insert_events(&self, events: Vec<NewEvent>) -> Result<Vec<Event>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Instance queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Events of one instance in ascending sequence order.
    async fn list_by_instance(&self, instance: &InstanceId, page: Page) -> Result<Vec<Event>>;

    /// Total event count for the instance; 0 if none.
    async fn count_by_instance(&self, instance: &InstanceId) -> Result<u64>;

    /// The registration owning the instance; `NotFound` if it has no events.
    async fn registration_of(&self, instance: &InstanceId) -> Result<RegistrationId>;

    /// The unique `WorkflowCompleted` event, if the instance has completed.
    async fn find_completed_event(&self, instance: &InstanceId) -> Result<Option<Event>>;

    /// The unique `WorkflowScheduled` event, if the instance was scheduled.
    async fn find_scheduled_event(&self, instance: &InstanceId) -> Result<Option<Event>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Registration queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Number of distinct instances ever created under the registration.
    async fn count_instances_of_registration(&self, registration: &RegistrationId) -> Result<u64>;

    /// One representative event per instance (its `WorkflowScheduled`), in
    /// instance creation order. The window counts instances.
    async fn list_instances_of_registration(
        &self,
        registration: &RegistrationId,
        page: Page,
    ) -> Result<Vec<Event>>;

    /// Every event of every instance under the registration, ordered by
    /// instance creation then sequence. The window counts events.
    async fn list_events_of_registration(
        &self,
        registration: &RegistrationId,
        page: Page,
    ) -> Result<Vec<Event>>;
}

#[async_trait]
impl<S: EventStore + ?Sized> EventStore for std::sync::Arc<S> {
    async fn insert_event(&self, event: NewEvent) -> Result<Event> {
        (**self).insert_event(event).await
    }

    async fn insert_events(&self, events: Vec<NewEvent>) -> Result<Vec<Event>> {
        (**self).insert_events(events).await
    }

    async fn list_by_instance(&self, instance: &InstanceId, page: Page) -> Result<Vec<Event>> {
        (**self).list_by_instance(instance, page).await
    }

    async fn count_by_instance(&self, instance: &InstanceId) -> Result<u64> {
        (**self).count_by_instance(instance).await
    }

    async fn registration_of(&self, instance: &InstanceId) -> Result<RegistrationId> {
        (**self).registration_of(instance).await
    }

    async fn find_completed_event(&self, instance: &InstanceId) -> Result<Option<Event>> {
        (**self).find_completed_event(instance).await
    }

    async fn find_scheduled_event(&self, instance: &InstanceId) -> Result<Option<Event>> {
        (**self).find_scheduled_event(instance).await
    }

    async fn count_instances_of_registration(&self, registration: &RegistrationId) -> Result<u64> {
        (**self).count_instances_of_registration(registration).await
    }

    async fn list_instances_of_registration(
        &self,
        registration: &RegistrationId,
        page: Page,
    ) -> Result<Vec<Event>> {
        (**self).list_instances_of_registration(registration, page).await
    }

    async fn list_events_of_registration(
        &self,
        registration: &RegistrationId,
        page: Page,
    ) -> Result<Vec<Event>> {
        (**self).list_events_of_registration(registration, page).await
    }
}
