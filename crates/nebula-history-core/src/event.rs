//! Event: one immutable record in a workflow's history.
//!
//! Callers build a [`NewEvent`]; the store assigns the sequence number and
//! recording time and hands back the persisted [`Event`]. Events are never
//! edited once stored.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::types::{InstanceId, RegistrationId};

/// The type of a history event.
///
/// Only the two lifecycle types are interpreted by the store; the rest are
/// carried opaquely for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum EventType {
    // Lifecycle (0x0000 - 0x00FF)
    /// Opens an instance's execution window. Establishes its registration.
    WorkflowScheduled = 0x0001,
    /// Closes an instance's execution window.
    WorkflowCompleted = 0x0002,

    // Decisions (0x0100 - 0x01FF)
    DecisionScheduled = 0x0100,
    DecisionCompleted = 0x0101,

    // Activities (0x0200 - 0x02FF)
    ActivityScheduled = 0x0200,
    ActivityCompleted = 0x0201,
    ActivityFailed = 0x0202,

    // Timers and signals (0x0300 - 0x03FF)
    TimerStarted = 0x0300,
    TimerFired = 0x0301,
    SignalReceived = 0x0302,
}

impl EventType {
    /// Convert to u16 for storage.
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Try to parse from u16.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::WorkflowScheduled),
            0x0002 => Some(Self::WorkflowCompleted),
            0x0100 => Some(Self::DecisionScheduled),
            0x0101 => Some(Self::DecisionCompleted),
            0x0200 => Some(Self::ActivityScheduled),
            0x0201 => Some(Self::ActivityCompleted),
            0x0202 => Some(Self::ActivityFailed),
            0x0300 => Some(Self::TimerStarted),
            0x0301 => Some(Self::TimerFired),
            0x0302 => Some(Self::SignalReceived),
            _ => None,
        }
    }

    /// Check if this type bounds an instance's execution window.
    pub fn is_lifecycle(self) -> bool {
        (self.to_u16() & 0xFF00) == 0x0000
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WorkflowScheduled => "WorkflowScheduled",
            Self::WorkflowCompleted => "WorkflowCompleted",
            Self::DecisionScheduled => "DecisionScheduled",
            Self::DecisionCompleted => "DecisionCompleted",
            Self::ActivityScheduled => "ActivityScheduled",
            Self::ActivityCompleted => "ActivityCompleted",
            Self::ActivityFailed => "ActivityFailed",
            Self::TimerStarted => "TimerStarted",
            Self::TimerFired => "TimerFired",
            Self::SignalReceived => "SignalReceived",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        ALL_EVENT_TYPES
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownEventType(s.to_owned()))
    }
}

/// Every event type, in code order.
pub const ALL_EVENT_TYPES: [EventType; 10] = [
    EventType::WorkflowScheduled,
    EventType::WorkflowCompleted,
    EventType::DecisionScheduled,
    EventType::DecisionCompleted,
    EventType::ActivityScheduled,
    EventType::ActivityCompleted,
    EventType::ActivityFailed,
    EventType::TimerStarted,
    EventType::TimerFired,
    EventType::SignalReceived,
];

/// An event ready to be appended (no sequence number yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub registration_id: RegistrationId,
    pub instance_id: InstanceId,
    pub event_type: EventType,
    pub payload: Bytes,
}

impl NewEvent {
    pub fn new(
        registration_id: RegistrationId,
        instance_id: InstanceId,
        event_type: EventType,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            registration_id,
            instance_id,
            event_type,
            payload: payload.into(),
        }
    }

    /// Build an event whose payload is the CBOR encoding of `value`.
    pub fn with_cbor<T: Serialize>(
        registration_id: RegistrationId,
        instance_id: InstanceId,
        event_type: EventType,
        value: &T,
    ) -> Result<Self> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf).map_err(|e| CoreError::Encoding(e.to_string()))?;
        Ok(Self::new(registration_id, instance_id, event_type, buf))
    }

    /// Attach the store-assigned position, producing the persisted event.
    pub fn into_event(self, sequence: u64, recorded_at: i64) -> Event {
        Event {
            sequence,
            registration_id: self.registration_id,
            instance_id: self.instance_id,
            event_type: self.event_type,
            payload: self.payload,
            recorded_at,
        }
    }
}

/// A persisted history event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Position within the instance history (1-indexed, never reused).
    pub sequence: u64,
    pub registration_id: RegistrationId,
    pub instance_id: InstanceId,
    pub event_type: EventType,
    /// Opaque engine data.
    pub payload: Bytes,
    /// Local time the store accepted the event (Unix ms).
    pub recorded_at: i64,
}

impl Event {
    /// Decode a CBOR payload written with [`NewEvent::with_cbor`].
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T> {
        ciborium::from_reader(self.payload.as_ref()).map_err(|e| CoreError::Decoding(e.to_string()))
    }

    pub fn is_scheduled(&self) -> bool {
        self.event_type == EventType::WorkflowScheduled
    }

    pub fn is_completed(&self) -> bool {
        self.event_type == EventType::WorkflowCompleted
    }
}
