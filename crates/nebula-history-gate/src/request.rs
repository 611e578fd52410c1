//! Request types accepted at the history boundary.
//!
//! Requests arrive from a transport as loosely-typed structs: every field is
//! a plain string that may be empty. The gate decides whether they are usable.

use serde::{Deserialize, Serialize};

/// A named request field, as the gate sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    AccessId,
    RegistrationId,
    InstanceId,
    Realm,
    RealmActId,
}

impl Field {
    /// The field's name on the wire, used in rejection messages.
    pub fn wire_name(self) -> &'static str {
        match self {
            Field::AccessId => "accessId",
            Field::RegistrationId => "registrationId",
            Field::InstanceId => "instanceId",
            Field::Realm => "realm",
            Field::RealmActId => "realmActId",
        }
    }
}

/// Kinds of request that reach the history store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    ScheduleWorkflow,
    CompleteDecision,
    CompleteActivity,
    GetEvents,
    GetInstances,
    GetWorkflowStatus,
}

/// A request the gate can inspect.
pub trait Request {
    fn kind(&self) -> RequestKind;

    /// The raw value of a field, or `None` if this request type has no such field.
    fn field(&self, field: Field) -> Option<&str>;
}

/// How a decision task ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionOutcome {
    /// More work follows.
    #[default]
    Continue,
    /// The decision closes the workflow.
    CompleteWorkflow,
}

/// How an activity task ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityOutcome {
    #[default]
    Succeeded,
    Failed,
}

/// Open a new workflow instance under a registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleWorkflowRequest {
    pub access_id: String,
    pub registration_id: String,
    pub instance_id: String,
    pub input: Vec<u8>,
}

/// Report the result of a decision task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompleteDecisionRequest {
    pub access_id: String,
    pub registration_id: String,
    pub instance_id: String,
    pub realm: String,
    pub realm_act_id: String,
    pub outcome: DecisionOutcome,
    pub result: Vec<u8>,
}

/// Report the result of an activity task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompleteActivityRequest {
    pub access_id: String,
    pub registration_id: String,
    pub instance_id: String,
    pub realm: String,
    pub realm_act_id: String,
    pub outcome: ActivityOutcome,
    pub result: Vec<u8>,
}

/// Read one page of an instance's history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetEventsRequest {
    pub access_id: String,
    pub registration_id: String,
    pub instance_id: String,
    pub offset: u64,
    /// Page size; the service default applies when absent.
    pub size: Option<u32>,
}

/// Read one page of the instances created under a registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetInstancesRequest {
    pub access_id: String,
    pub registration_id: String,
    pub offset: u64,
    pub size: Option<u32>,
}

/// Ask for the derived lifecycle state of an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetWorkflowStatusRequest {
    pub access_id: String,
    pub registration_id: String,
    pub instance_id: String,
}

impl Request for ScheduleWorkflowRequest {
    fn kind(&self) -> RequestKind {
        RequestKind::ScheduleWorkflow
    }

    fn field(&self, field: Field) -> Option<&str> {
        match field {
            Field::AccessId => Some(&self.access_id),
            Field::RegistrationId => Some(&self.registration_id),
            Field::InstanceId => Some(&self.instance_id),
            Field::Realm | Field::RealmActId => None,
        }
    }
}

impl Request for CompleteDecisionRequest {
    fn kind(&self) -> RequestKind {
        RequestKind::CompleteDecision
    }

    fn field(&self, field: Field) -> Option<&str> {
        match field {
            Field::AccessId => Some(&self.access_id),
            Field::RegistrationId => Some(&self.registration_id),
            Field::InstanceId => Some(&self.instance_id),
            Field::Realm => Some(&self.realm),
            Field::RealmActId => Some(&self.realm_act_id),
        }
    }
}

impl Request for CompleteActivityRequest {
    fn kind(&self) -> RequestKind {
        RequestKind::CompleteActivity
    }

    fn field(&self, field: Field) -> Option<&str> {
        match field {
            Field::AccessId => Some(&self.access_id),
            Field::RegistrationId => Some(&self.registration_id),
            Field::InstanceId => Some(&self.instance_id),
            Field::Realm => Some(&self.realm),
            Field::RealmActId => Some(&self.realm_act_id),
        }
    }
}

impl Request for GetEventsRequest {
    fn kind(&self) -> RequestKind {
        RequestKind::GetEvents
    }

    fn field(&self, field: Field) -> Option<&str> {
        match field {
            Field::AccessId => Some(&self.access_id),
            Field::RegistrationId => Some(&self.registration_id),
            Field::InstanceId => Some(&self.instance_id),
            Field::Realm | Field::RealmActId => None,
        }
    }
}

impl Request for GetInstancesRequest {
    fn kind(&self) -> RequestKind {
        RequestKind::GetInstances
    }

    fn field(&self, field: Field) -> Option<&str> {
        match field {
            Field::AccessId => Some(&self.access_id),
            Field::RegistrationId => Some(&self.registration_id),
            Field::InstanceId | Field::Realm | Field::RealmActId => None,
        }
    }
}

impl Request for GetWorkflowStatusRequest {
    fn kind(&self) -> RequestKind {
        RequestKind::GetWorkflowStatus
    }

    fn field(&self, field: Field) -> Option<&str> {
        match field {
            Field::AccessId => Some(&self.access_id),
            Field::RegistrationId => Some(&self.registration_id),
            Field::InstanceId => Some(&self.instance_id),
            Field::Realm | Field::RealmActId => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(Field::AccessId.wire_name(), "accessId");
        assert_eq!(Field::RealmActId.wire_name(), "realmActId");
    }

    #[test]
    fn test_missing_fields_deserialize_blank() {
        let json = r#"{"accessId":"acc1","registrationId":"acc1:reg","instanceId":"acc1:run","realm":"default"}"#;
        let request: CompleteDecisionRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.field(Field::Realm), Some("default"));
        assert_eq!(request.field(Field::RealmActId), Some(""));
        assert_eq!(request.outcome, DecisionOutcome::Continue);
    }

    #[test]
    fn test_instances_request_has_no_instance_field() {
        let request = GetInstancesRequest {
            access_id: "acc1".into(),
            registration_id: "acc1:reg".into(),
            ..Default::default()
        };
        assert_eq!(request.field(Field::InstanceId), None);
        assert_eq!(request.kind(), RequestKind::GetInstances);
    }
}
