//! In-memory implementation of the EventStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use nebula_history_core::{Event, InstanceId, NewEvent, RegistrationId};

use crate::append::{check_append, check_batch, InstanceHead};
use crate::error::{Result, StoreError};
use crate::traits::{EventStore, Page};

/// In-memory store implementation.
///
/// Each instance log sits behind its own lock, so appends to different
/// instances never wait on each other. The outer index is write-locked only
/// while an instance is being created.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Instance logs indexed by ID.
    instances: HashMap<InstanceId, Arc<RwLock<InstanceLog>>>,

    /// Instances per registration, in creation order.
    registrations: HashMap<RegistrationId, Vec<InstanceId>>,
}

struct InstanceLog {
    head: InstanceHead,
    events: Vec<Event>,
}

impl InstanceLog {
    /// Validate every event against a scratch head, then commit them all.
    fn append(&mut self, events: Vec<NewEvent>) -> Result<Vec<Event>> {
        let mut head = self.head.clone();
        let now = now_millis();
        let mut staged = Vec::with_capacity(events.len());

        for event in events {
            let sequence = check_append(&head, &event)?;
            head.record(&event, sequence);
            staged.push(event.into_event(sequence, now));
        }

        self.head = head;
        self.events.extend(staged.iter().cloned());
        Ok(staged)
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                instances: HashMap::new(),
                registrations: HashMap::new(),
            }),
        }
    }

    fn log(&self, instance: &InstanceId) -> Result<Option<Arc<RwLock<InstanceLog>>>> {
        Ok(read(&self.inner)?.instances.get(instance).cloned())
    }

    fn logs_of(&self, registration: &RegistrationId) -> Result<Vec<Arc<RwLock<InstanceLog>>>> {
        let inner = read(&self.inner)?;
        Ok(inner
            .registrations
            .get(registration)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.instances.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn find_event(
        &self,
        instance: &InstanceId,
        pred: impl Fn(&Event) -> bool,
    ) -> Result<Option<Event>> {
        match self.log(instance)? {
            Some(log) => Ok(read(&log)?.events.iter().find(|e| pred(e)).cloned()),
            None => Ok(None),
        }
    }
}

impl MemoryStore {
    /// Append a single-instance batch under that instance's lock.
    fn append(&self, events: Vec<NewEvent>) -> Result<Vec<Event>> {
        check_batch(&events)?;
        let Some(first) = events.first() else {
            return Ok(Vec::new());
        };

        if let Some(log) = self.log(&first.instance_id)? {
            return write(&log)?.append(events);
        }

        // First events for this instance: create it under the index lock so
        // two racing openers cannot both succeed.
        let mut inner = write(&self.inner)?;
        let existing = inner.instances.get(&first.instance_id).cloned();
        if let Some(log) = existing {
            drop(inner);
            return write(&log)?.append(events);
        }

        let instance = first.instance_id.clone();
        let registration = first.registration_id.clone();
        let mut log = InstanceLog {
            head: InstanceHead::default(),
            events: Vec::new(),
        };
        let stored = log.append(events)?;

        inner
            .instances
            .insert(instance.clone(), Arc::new(RwLock::new(log)));
        inner
            .registrations
            .entry(registration)
            .or_default()
            .push(instance);

        Ok(stored)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_event(&self, event: NewEvent) -> Result<Event> {
        let instance = event.instance_id.clone();
        self.append(vec![event])?
            .pop()
            .ok_or_else(|| StoreError::InvalidData(format!("append to {instance} stored nothing")))
    }

    async fn insert_events(&self, events: Vec<NewEvent>) -> Result<Vec<Event>> {
        self.append(events)
    }

    async fn list_by_instance(&self, instance: &InstanceId, page: Page) -> Result<Vec<Event>> {
        match self.log(instance)? {
            Some(log) => Ok(page.apply(read(&log)?.events.iter().cloned())),
            None => Ok(Vec::new()),
        }
    }

    async fn count_by_instance(&self, instance: &InstanceId) -> Result<u64> {
        match self.log(instance)? {
            Some(log) => Ok(read(&log)?.events.len() as u64),
            None => Ok(0),
        }
    }

    async fn registration_of(&self, instance: &InstanceId) -> Result<RegistrationId> {
        let log = self
            .log(instance)?
            .ok_or_else(|| StoreError::NotFound(instance.clone()))?;
        let registration = read(&log)?.head.registration.clone();
        registration.ok_or_else(|| StoreError::NotFound(instance.clone()))
    }

    async fn find_completed_event(&self, instance: &InstanceId) -> Result<Option<Event>> {
        self.find_event(instance, Event::is_completed)
    }

    async fn find_scheduled_event(&self, instance: &InstanceId) -> Result<Option<Event>> {
        self.find_event(instance, Event::is_scheduled)
    }

    async fn count_instances_of_registration(&self, registration: &RegistrationId) -> Result<u64> {
        let inner = read(&self.inner)?;
        Ok(inner
            .registrations
            .get(registration)
            .map(|ids| ids.len() as u64)
            .unwrap_or(0))
    }

    async fn list_instances_of_registration(
        &self,
        registration: &RegistrationId,
        page: Page,
    ) -> Result<Vec<Event>> {
        let logs = page.apply(self.logs_of(registration)?.into_iter());

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            // The opening event is always the WorkflowScheduled.
            if let Some(first) = read(&log)?.events.first() {
                events.push(first.clone());
            }
        }
        Ok(events)
    }

    async fn list_events_of_registration(
        &self,
        registration: &RegistrationId,
        page: Page,
    ) -> Result<Vec<Event>> {
        let mut skip = usize::try_from(page.offset).unwrap_or(usize::MAX);
        let mut remaining = page.limit as usize;
        let mut events = Vec::new();

        for log in self.logs_of(registration)? {
            if remaining == 0 {
                break;
            }
            let log = read(&log)?;
            if skip >= log.events.len() {
                skip -= log.events.len();
                continue;
            }
            let taken: Vec<Event> = log.events[skip..].iter().take(remaining).cloned().collect();
            skip = 0;
            remaining -= taken.len();
            events.extend(taken);
        }

        Ok(events)
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_history_core::{AccessScope, EventType};

    fn scope() -> AccessScope {
        AccessScope::new("acc1").unwrap()
    }

    fn reg(name: &str) -> RegistrationId {
        RegistrationId::new(&scope(), name).unwrap()
    }

    fn inst(name: &str) -> InstanceId {
        InstanceId::new(&scope(), name).unwrap()
    }

    fn new_event(r: &str, i: &str, event_type: EventType) -> NewEvent {
        NewEvent::new(reg(r), inst(i), event_type, format!("{i}/{event_type}").into_bytes())
    }

    fn positions(events: &[Event]) -> Vec<(&str, u64)> {
        events
            .iter()
            .map(|e| (e.instance_id.local(), e.sequence))
            .collect()
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();

        let scheduled = store
            .insert_event(new_event("r1", "i1", EventType::WorkflowScheduled))
            .await
            .unwrap();
        assert_eq!(scheduled.sequence, 1);

        let decision = store
            .insert_event(new_event("r1", "i1", EventType::DecisionScheduled))
            .await
            .unwrap();
        assert_eq!(decision.sequence, 2);

        assert_eq!(store.count_by_instance(&inst("i1")).await.unwrap(), 2);
        assert_eq!(store.registration_of(&inst("i1")).await.unwrap(), reg("r1"));
    }

    #[tokio::test]
    async fn test_failed_open_leaves_no_trace() {
        let store = MemoryStore::new();

        let result = store
            .insert_event(new_event("r1", "i2", EventType::WorkflowCompleted))
            .await;
        assert!(matches!(result, Err(StoreError::OutOfOrderEvent { .. })));

        assert_eq!(store.count_by_instance(&inst("i2")).await.unwrap(), 0);
        assert_eq!(store.count_instances_of_registration(&reg("r1")).await.unwrap(), 0);
        assert!(matches!(
            store.registration_of(&inst("i2")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_events_of_registration_span_instances() {
        let store = MemoryStore::new();
        for i in ["a", "b"] {
            store.insert_event(new_event("r1", i, EventType::WorkflowScheduled)).await.unwrap();
            store.insert_event(new_event("r1", i, EventType::ActivityScheduled)).await.unwrap();
        }

        let all = store
            .list_events_of_registration(&reg("r1"), Page::first(10))
            .await
            .unwrap();
        assert_eq!(positions(&all), vec![("a", 1), ("a", 2), ("b", 1), ("b", 2)]);

        let middle = store
            .list_events_of_registration(&reg("r1"), Page::new(1, 2))
            .await
            .unwrap();
        assert_eq!(positions(&middle), vec![("a", 2), ("b", 1)]);
    }

    #[tokio::test]
    async fn test_concurrent_scheduled_single_winner() {
        let store = Arc::new(MemoryStore::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .insert_event(new_event("r1", "race", EventType::WorkflowScheduled))
                    .await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(StoreError::DuplicateLifecycleEvent { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(store.count_by_instance(&inst("race")).await.unwrap(), 1);
        assert_eq!(store.count_instances_of_registration(&reg("r1")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let store = MemoryStore::new();

        // A batch may open the instance.
        let opened = store
            .insert_events(vec![
                new_event("r1", "i1", EventType::WorkflowScheduled),
                new_event("r1", "i1", EventType::DecisionCompleted),
            ])
            .await
            .unwrap();
        assert_eq!(positions(&opened), vec![("i1", 1), ("i1", 2)]);

        store
            .insert_event(new_event("r1", "i1", EventType::WorkflowCompleted))
            .await
            .unwrap();

        let result = store
            .insert_events(vec![
                new_event("r1", "i1", EventType::DecisionCompleted),
                new_event("r1", "i1", EventType::WorkflowCompleted),
            ])
            .await;
        assert!(matches!(
            result,
            Err(StoreError::DuplicateLifecycleEvent {
                event_type: EventType::WorkflowCompleted,
                ..
            })
        ));
        assert_eq!(store.count_by_instance(&inst("i1")).await.unwrap(), 3);

        // The head was not advanced by the rejected batch.
        let next = store
            .insert_event(new_event("r1", "i1", EventType::TimerFired))
            .await
            .unwrap();
        assert_eq!(next.sequence, 4);
    }

    #[tokio::test]
    async fn test_rejected_opening_batch_leaves_no_instance() {
        let store = MemoryStore::new();

        let result = store
            .insert_events(vec![
                new_event("r1", "i1", EventType::WorkflowScheduled),
                new_event("r1", "i1", EventType::WorkflowScheduled),
            ])
            .await;
        assert!(matches!(result, Err(StoreError::DuplicateLifecycleEvent { .. })));
        assert_eq!(store.count_instances_of_registration(&reg("r1")).await.unwrap(), 0);

        let mixed = store
            .insert_events(vec![
                new_event("r1", "i1", EventType::WorkflowScheduled),
                new_event("r1", "i2", EventType::WorkflowScheduled),
            ])
            .await;
        assert!(matches!(mixed, Err(StoreError::MixedBatch { .. })));
    }
}
