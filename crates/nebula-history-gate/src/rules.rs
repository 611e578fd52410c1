//! Structural rule sets, one per request kind.
//!
//! Rules are data, not code: each kind maps to a list of required fields and
//! what role each field plays. Phase 1 of the gate walks the list checking
//! presence; phase 2 walks it again to find the claim and the scoped ids.

use crate::request::{Field, RequestKind};

/// The role a required field plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Check {
    /// The caller's access scope claim. Exactly one per rule set.
    Claim,
    /// A composite identifier whose embedded scope must match the claim.
    Identifier,
    /// Any non-blank value.
    Present,
}

/// One required-field predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRule {
    pub field: Field,
    pub check: Check,
}

impl FieldRule {
    pub const fn new(field: Field, check: Check) -> Self {
        Self { field, check }
    }
}

/// The rules applied to one request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSet {
    pub kind: RequestKind,
    pub rules: &'static [FieldRule],
}

const ACCESS: FieldRule = FieldRule::new(Field::AccessId, Check::Claim);
const REGISTRATION: FieldRule = FieldRule::new(Field::RegistrationId, Check::Identifier);
const INSTANCE: FieldRule = FieldRule::new(Field::InstanceId, Check::Identifier);
const REALM: FieldRule = FieldRule::new(Field::Realm, Check::Present);
const REALM_ACT: FieldRule = FieldRule::new(Field::RealmActId, Check::Present);

const INSTANCE_RULES: &[FieldRule] = &[ACCESS, REGISTRATION, INSTANCE];
const TASK_RULES: &[FieldRule] = &[ACCESS, REGISTRATION, INSTANCE, REALM, REALM_ACT];
const REGISTRATION_RULES: &[FieldRule] = &[ACCESS, REGISTRATION];

/// The default lookup table.
pub static DEFAULT_RULES: &[RuleSet] = &[
    RuleSet {
        kind: RequestKind::ScheduleWorkflow,
        rules: INSTANCE_RULES,
    },
    RuleSet {
        kind: RequestKind::CompleteDecision,
        rules: TASK_RULES,
    },
    RuleSet {
        kind: RequestKind::CompleteActivity,
        rules: TASK_RULES,
    },
    RuleSet {
        kind: RequestKind::GetEvents,
        rules: INSTANCE_RULES,
    },
    RuleSet {
        kind: RequestKind::GetInstances,
        rules: REGISTRATION_RULES,
    },
    RuleSet {
        kind: RequestKind::GetWorkflowStatus,
        rules: INSTANCE_RULES,
    },
];

/// Look up the rule list for a kind in a table.
pub fn rules_for(table: &[RuleSet], kind: RequestKind) -> Option<&'static [FieldRule]> {
    table.iter().find(|set| set.kind == kind).map(|set| set.rules)
}
