//! The History service: gate in front, store behind.
//!
//! Every operation admits its request through the [`Gate`] first and only
//! then touches the store. Reads are bounded by
//! [`HistoryConfig::store_timeout`]. Appends are bounded inside the store
//! and always awaited to the end, so a `StoreUnavailable` from an append
//! means nothing was written.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use nebula_history_core::{
    Event, EventType, InstanceId, LifecycleState, NewEvent, RegistrationId,
};
use nebula_history_gate::{
    ActivityOutcome, CompleteActivityRequest, CompleteDecisionRequest, DecisionOutcome, Gate,
    GetEventsRequest, GetInstancesRequest, GetWorkflowStatusRequest, ScheduleWorkflowRequest,
};
use nebula_history_store::{EventStore, SqliteStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::HistoryConfig;
use crate::error::{HistoryError, Result};

/// Payload recorded for completed decision and activity tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub realm: String,
    pub realm_act_id: String,
    pub result: Vec<u8>,
}

/// One page of an instance's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPage {
    /// Events in the whole history, not just this page.
    pub total: u64,
    pub offset: u64,
    pub events: Vec<Event>,
}

impl EventPage {
    pub fn has_more(&self) -> bool {
        self.offset.saturating_add(self.events.len() as u64) < self.total
    }
}

/// One page of the instances created under a registration.
///
/// Each instance is represented by its `WorkflowScheduled` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstancePage {
    pub total: u64,
    pub offset: u64,
    pub instances: Vec<Event>,
}

impl InstancePage {
    pub fn has_more(&self) -> bool {
        self.offset.saturating_add(self.instances.len() as u64) < self.total
    }

    pub fn instance_ids(&self) -> impl Iterator<Item = &InstanceId> {
        self.instances.iter().map(|e| &e.instance_id)
    }
}

/// Derived view of an instance's execution state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    pub instance_id: InstanceId,
    pub registration_id: RegistrationId,
    pub state: LifecycleState,
    pub scheduled_at: i64,
    pub completed_at: Option<i64>,
    pub event_count: u64,
}

/// The workflow history service.
pub struct History<S: EventStore> {
    store: Arc<S>,
    gate: Gate,
    config: HistoryConfig,
}

impl<S: EventStore> Clone for History<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            gate: self.gate,
            config: self.config.clone(),
        }
    }
}

impl<S: EventStore> History<S> {
    pub fn new(store: S, config: HistoryConfig) -> Self {
        Self::from_shared(Arc::new(store), config)
    }

    /// Build on a store that is shared with other owners.
    pub fn from_shared(store: Arc<S>, config: HistoryConfig) -> Self {
        Self {
            store,
            gate: Gate::new(),
            config,
        }
    }

    /// Replace the default gate.
    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Append Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a new instance with its `WorkflowScheduled` event.
    pub async fn schedule_workflow(&self, request: ScheduleWorkflowRequest) -> Result<Event> {
        let (request, _, registration, instance) = self.gate.admit(request)?.into_parts();
        let (registration, instance) = linked(registration, instance)?;

        self.append(NewEvent::new(
            registration,
            instance,
            EventType::WorkflowScheduled,
            request.input,
        ))
        .await
    }

    /// Record a decision result; close the workflow if the decision says so.
    ///
    /// The decision and the close are appended as one batch, so a rejected
    /// close leaves no decision behind. Returns the events appended, in order.
    pub async fn complete_decision(&self, request: CompleteDecisionRequest) -> Result<Vec<Event>> {
        let (request, _, registration, instance) = self.gate.admit(request)?.into_parts();
        let (registration, instance) = linked(registration, instance)?;
        let closes = request.outcome == DecisionOutcome::CompleteWorkflow;

        let record = TaskRecord {
            realm: request.realm,
            realm_act_id: request.realm_act_id,
            result: request.result,
        };
        let mut events = vec![NewEvent::with_cbor(
            registration.clone(),
            instance.clone(),
            EventType::DecisionCompleted,
            &record,
        )?];
        if closes {
            events.push(NewEvent::new(
                registration,
                instance,
                EventType::WorkflowCompleted,
                record.result,
            ));
        }

        let appended = settle("insert_events", self.store.insert_events(events).await)?;
        for event in &appended {
            trace!(
                instance = %event.instance_id,
                sequence = event.sequence,
                event_type = %event.event_type,
                "event appended"
            );
        }
        Ok(appended)
    }

    /// Record an activity result.
    pub async fn complete_activity(&self, request: CompleteActivityRequest) -> Result<Event> {
        let (request, _, registration, instance) = self.gate.admit(request)?.into_parts();
        let (registration, instance) = linked(registration, instance)?;

        let event_type = match request.outcome {
            ActivityOutcome::Succeeded => EventType::ActivityCompleted,
            ActivityOutcome::Failed => EventType::ActivityFailed,
        };
        let record = TaskRecord {
            realm: request.realm,
            realm_act_id: request.realm_act_id,
            result: request.result,
        };

        self.append(NewEvent::with_cbor(registration, instance, event_type, &record)?)
            .await
    }

    /// Append an event that has already been authorized.
    ///
    /// Not wrapped in the read timeout: abandoning the future would not stop
    /// the write.
    async fn append(&self, event: NewEvent) -> Result<Event> {
        let event_type = event.event_type;
        let stored = settle("insert_event", self.store.insert_event(event).await)?;
        trace!(
            instance = %stored.instance_id,
            sequence = stored.sequence,
            %event_type,
            "event appended"
        );
        Ok(stored)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Read one page of an instance's history in sequence order.
    ///
    /// An instance with no events yields an empty page.
    pub async fn get_events(&self, request: GetEventsRequest) -> Result<EventPage> {
        let (request, _, registration, instance) = self.gate.admit(request)?.into_parts();
        let (registration, instance) = linked(registration, instance)?;
        let page = self.config.page(request.offset, request.size);

        let total = self
            .call("count_by_instance", self.store.count_by_instance(&instance))
            .await?;
        if total > 0 {
            self.ensure_linked(&registration, &instance).await?;
        }

        let events = if page.offset >= total || page.limit == 0 {
            Vec::new()
        } else {
            self.call("list_by_instance", self.store.list_by_instance(&instance, page))
                .await?
        };

        Ok(EventPage {
            total,
            offset: page.offset,
            events,
        })
    }

    /// Read one page of the instances under a registration, in creation order.
    pub async fn get_instances(&self, request: GetInstancesRequest) -> Result<InstancePage> {
        let (request, _, registration, _) = self.gate.admit(request)?.into_parts();
        let registration = registration.ok_or(HistoryError::InvalidRequest("registrationId"))?;
        let page = self.config.page(request.offset, request.size);

        let total = self
            .call(
                "count_instances_of_registration",
                self.store.count_instances_of_registration(&registration),
            )
            .await?;

        let instances = if page.offset >= total || page.limit == 0 {
            Vec::new()
        } else {
            self.call(
                "list_instances_of_registration",
                self.store.list_instances_of_registration(&registration, page),
            )
            .await?
        };

        Ok(InstancePage {
            total,
            offset: page.offset,
            instances,
        })
    }

    /// Derive the lifecycle state of an instance.
    ///
    /// Recomputed from the two lifecycle lookups on every call.
    pub async fn workflow_status(
        &self,
        request: GetWorkflowStatusRequest,
    ) -> Result<WorkflowStatus> {
        let (_, _, registration, instance) = self.gate.admit(request)?.into_parts();
        let (registration, instance) = linked(registration, instance)?;

        let scheduled = self
            .call("find_scheduled_event", self.store.find_scheduled_event(&instance))
            .await?
            .ok_or_else(|| HistoryError::NotFound(instance.clone()))?;
        if scheduled.registration_id != registration {
            return Err(HistoryError::RegistrationMismatch {
                instance,
                recorded: scheduled.registration_id,
                requested: registration,
            });
        }

        let completed = self
            .call("find_completed_event", self.store.find_completed_event(&instance))
            .await?;
        let state = LifecycleState::derive(Some(&scheduled), completed.as_ref())
            .ok_or_else(|| HistoryError::NotFound(instance.clone()))?;
        let event_count = self
            .call("count_by_instance", self.store.count_by_instance(&instance))
            .await?;

        Ok(WorkflowStatus {
            instance_id: instance,
            registration_id: registration,
            state,
            scheduled_at: scheduled.recorded_at,
            completed_at: completed.map(|e| e.recorded_at),
            event_count,
        })
    }

    /// The requested registration must be the one the instance was opened under.
    async fn ensure_linked(
        &self,
        registration: &RegistrationId,
        instance: &InstanceId,
    ) -> Result<()> {
        let recorded = self
            .call("registration_of", self.store.registration_of(instance))
            .await?;
        if &recorded != registration {
            debug!(%instance, %recorded, requested = %registration, "registration mismatch");
            return Err(HistoryError::RegistrationMismatch {
                instance: instance.clone(),
                recorded,
                requested: registration.clone(),
            });
        }
        Ok(())
    }

    /// Run one read under the configured timeout.
    async fn call<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        let timeout = self.config.store_timeout;
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => settle(op, result),
            Err(_) => {
                warn!(op, timeout_ms = timeout.as_millis() as u64, "store call timed out");
                Err(HistoryError::StoreUnavailable(format!(
                    "{op} timed out after {timeout:?}"
                )))
            }
        }
    }
}

impl History<SqliteStore> {
    /// Open a SQLite-backed service whose append lock wait matches
    /// `config.store_timeout`.
    pub fn open(path: impl AsRef<Path>, config: HistoryConfig) -> Result<Self> {
        let store = SqliteStore::open_with(path, config.sqlite())?;
        Ok(Self::new(store, config))
    }
}

/// Log a store outcome and fold it into the service taxonomy.
fn settle<T>(op: &'static str, result: std::result::Result<T, StoreError>) -> Result<T> {
    result.map_err(|err| {
        if err.is_unavailable() {
            warn!(op, error = %err, "store call failed");
        } else {
            debug!(op, error = %err, "store rejected call");
        }
        err.into()
    })
}

/// Both ids are guaranteed by the gate's rules for instance-level requests.
fn linked(
    registration: Option<RegistrationId>,
    instance: Option<InstanceId>,
) -> Result<(RegistrationId, InstanceId)> {
    let registration = registration.ok_or(HistoryError::InvalidRequest("registrationId"))?;
    let instance = instance.ok_or(HistoryError::InvalidRequest("instanceId"))?;
    Ok((registration, instance))
}
