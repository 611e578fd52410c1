//! Proptest generators for property-based testing.

use proptest::prelude::*;

use nebula_history_core::{
    AccessScope, EventType, InstanceId, RegistrationId, ALL_EVENT_TYPES,
};

/// Generate a valid access scope.
pub fn scope() -> impl Strategy<Value = AccessScope> {
    "[a-z][a-z0-9_-]{0,15}".prop_map(|s| AccessScope::new(s).expect("pattern yields valid scopes"))
}

/// Generate a local part, which may itself contain the delimiter.
pub fn local_part() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9:._-]{1,24}"
}

/// Generate a registration id.
pub fn registration_id() -> impl Strategy<Value = RegistrationId> {
    (scope(), local_part()).prop_map(|(scope, local)| {
        RegistrationId::new(&scope, &local).expect("non-empty local part")
    })
}

/// Generate an instance id.
pub fn instance_id() -> impl Strategy<Value = InstanceId> {
    (scope(), local_part())
        .prop_map(|(scope, local)| InstanceId::new(&scope, &local).expect("non-empty local part"))
}

/// Generate any event type.
pub fn event_type() -> impl Strategy<Value = EventType> {
    proptest::sample::select(ALL_EVENT_TYPES.to_vec())
}

/// Generate an event type that is not a lifecycle event.
pub fn body_event_type() -> impl Strategy<Value = EventType> {
    let body: Vec<EventType> = ALL_EVENT_TYPES
        .iter()
        .copied()
        .filter(|t| !t.is_lifecycle())
        .collect();
    proptest::sample::select(body)
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// One attempted insert in a random history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOp {
    /// Index into a small pool of instances.
    pub instance: usize,
    pub event_type: EventType,
}

/// Generate a sequence of inserts spread over `instances` instances.
///
/// Lifecycle events are weighted up so duplicates and out-of-order
/// completions show up often.
pub fn insert_ops(instances: usize, max_len: usize) -> impl Strategy<Value = Vec<InsertOp>> {
    let instances = instances.max(1);
    let op = (
        0..instances,
        prop_oneof![
            3 => Just(EventType::WorkflowScheduled),
            2 => Just(EventType::WorkflowCompleted),
            5 => body_event_type(),
        ],
    )
        .prop_map(|(instance, event_type)| InsertOp {
            instance,
            event_type,
        });
    prop::collection::vec(op, 0..=max_len)
}
