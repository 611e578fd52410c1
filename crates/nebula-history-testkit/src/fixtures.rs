//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use nebula_history_core::{AccessScope, Event, EventType, InstanceId, NewEvent, RegistrationId};
use nebula_history_gate::{
    ActivityOutcome, CompleteActivityRequest, CompleteDecisionRequest, DecisionOutcome,
    GetEventsRequest, GetInstancesRequest, GetWorkflowStatusRequest, ScheduleWorkflowRequest,
};
use nebula_history_store::{EventStore, Result};

/// A test fixture with one scope and one registration.
///
/// Stores are supplied by the caller so the same fixture drives every backend.
pub struct HistoryFixture {
    pub scope: AccessScope,
    pub registration: RegistrationId,
}

impl HistoryFixture {
    /// Create a fixture for `scope` with registration `<scope>:order`.
    ///
    /// Panics if `scope` is not a valid scope token.
    pub fn new(scope: &str) -> Self {
        Self::with_registration(scope, "order")
    }

    pub fn with_registration(scope: &str, registration: &str) -> Self {
        let scope = AccessScope::new(scope).expect("fixture scope must be valid");
        let registration =
            RegistrationId::new(&scope, registration).expect("fixture registration must be valid");
        Self {
            scope,
            registration,
        }
    }

    /// An instance id in this fixture's scope.
    pub fn instance(&self, local: &str) -> InstanceId {
        InstanceId::new(&self.scope, local).expect("fixture instance must be valid")
    }

    /// Another registration in the same scope.
    pub fn registration(&self, local: &str) -> RegistrationId {
        RegistrationId::new(&self.scope, local).expect("fixture registration must be valid")
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event builders
    // ─────────────────────────────────────────────────────────────────────────

    pub fn event(&self, instance: &InstanceId, event_type: EventType, payload: &[u8]) -> NewEvent {
        NewEvent::new(
            self.registration.clone(),
            instance.clone(),
            event_type,
            payload.to_vec(),
        )
    }

    pub fn scheduled(&self, instance: &InstanceId, payload: &[u8]) -> NewEvent {
        self.event(instance, EventType::WorkflowScheduled, payload)
    }

    pub fn completed(&self, instance: &InstanceId, payload: &[u8]) -> NewEvent {
        self.event(instance, EventType::WorkflowCompleted, payload)
    }

    /// Open `instance` and append `extra` signal events after it.
    pub async fn seed<S: EventStore + ?Sized>(
        &self,
        store: &S,
        instance: &InstanceId,
        extra: usize,
    ) -> Result<Vec<Event>> {
        let mut events = vec![store.insert_event(self.scheduled(instance, b"input")).await?];
        for i in 0..extra {
            let payload = (i as u32).to_be_bytes();
            events.push(
                store
                    .insert_event(self.event(instance, EventType::SignalReceived, &payload))
                    .await?,
            );
        }
        Ok(events)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Request builders
    // ─────────────────────────────────────────────────────────────────────────

    pub fn schedule_request(&self, instance: &InstanceId) -> ScheduleWorkflowRequest {
        ScheduleWorkflowRequest {
            access_id: self.scope.to_string(),
            registration_id: self.registration.to_string(),
            instance_id: instance.to_string(),
            input: b"input".to_vec(),
        }
    }

    pub fn decision_request(
        &self,
        instance: &InstanceId,
        outcome: DecisionOutcome,
    ) -> CompleteDecisionRequest {
        CompleteDecisionRequest {
            access_id: self.scope.to_string(),
            registration_id: self.registration.to_string(),
            instance_id: instance.to_string(),
            realm: "default".into(),
            realm_act_id: "act-1".into(),
            outcome,
            result: b"result".to_vec(),
        }
    }

    pub fn activity_request(
        &self,
        instance: &InstanceId,
        outcome: ActivityOutcome,
    ) -> CompleteActivityRequest {
        CompleteActivityRequest {
            access_id: self.scope.to_string(),
            registration_id: self.registration.to_string(),
            instance_id: instance.to_string(),
            realm: "default".into(),
            realm_act_id: "act-2".into(),
            outcome,
            result: Vec::new(),
        }
    }

    pub fn events_request(
        &self,
        instance: &InstanceId,
        offset: u64,
        size: Option<u32>,
    ) -> GetEventsRequest {
        GetEventsRequest {
            access_id: self.scope.to_string(),
            registration_id: self.registration.to_string(),
            instance_id: instance.to_string(),
            offset,
            size,
        }
    }

    pub fn instances_request(&self, offset: u64, size: Option<u32>) -> GetInstancesRequest {
        GetInstancesRequest {
            access_id: self.scope.to_string(),
            registration_id: self.registration.to_string(),
            offset,
            size,
        }
    }

    pub fn status_request(&self, instance: &InstanceId) -> GetWorkflowStatusRequest {
        GetWorkflowStatusRequest {
            access_id: self.scope.to_string(),
            registration_id: self.registration.to_string(),
            instance_id: instance.to_string(),
        }
    }
}

impl Default for HistoryFixture {
    fn default() -> Self {
        Self::new("acc1")
    }
}

/// Create fixtures for distinct scopes `acc1`, `acc2`, ...
pub fn multi_scope_fixtures(count: usize) -> Vec<HistoryFixture> {
    (1..=count)
        .map(|i| HistoryFixture::new(&format!("acc{i}")))
        .collect()
}
