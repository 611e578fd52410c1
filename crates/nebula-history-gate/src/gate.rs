//! The two-phase admission gate.
//!
//! A request moves `Received → StructurallyValid → Authorized → Accepted`.
//! Either check can send it to `Rejected`; nothing is retried.

use nebula_history_core::{AccessScope, CoreError, InstanceId, RegistrationId};
use tracing::{debug, trace};

use crate::error::{GateError, Result};
use crate::request::{Field, Request, RequestKind};
use crate::rules::{rules_for, Check, FieldRule, RuleSet, DEFAULT_RULES};

/// Where a request is in the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateState {
    Received,
    StructurallyValid,
    Authorized,
    Accepted,
    Rejected,
}

/// A request that passed both phases.
///
/// The request itself is untouched; the parsed ids ride along so the caller
/// does not decode them a second time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admitted<R> {
    request: R,
    scope: AccessScope,
    registration_id: Option<RegistrationId>,
    instance_id: Option<InstanceId>,
}

impl<R> Admitted<R> {
    pub fn request(&self) -> &R {
        &self.request
    }

    /// The caller's verified access scope.
    pub fn scope(&self) -> &AccessScope {
        &self.scope
    }

    pub fn registration_id(&self) -> Option<&RegistrationId> {
        self.registration_id.as_ref()
    }

    pub fn instance_id(&self) -> Option<&InstanceId> {
        self.instance_id.as_ref()
    }

    pub fn into_inner(self) -> R {
        self.request
    }

    /// Split into the request and its parsed ids.
    pub fn into_parts(self) -> (R, AccessScope, Option<RegistrationId>, Option<InstanceId>) {
        (self.request, self.scope, self.registration_id, self.instance_id)
    }
}

/// Stateless request gate.
///
/// Holds only a reference to a static rule table, so one value can be shared
/// freely across tasks.
#[derive(Debug, Clone, Copy)]
pub struct Gate {
    table: &'static [RuleSet],
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    pub fn new() -> Self {
        Self { table: DEFAULT_RULES }
    }

    /// Use a custom rule table.
    pub fn with_rules(table: &'static [RuleSet]) -> Self {
        Self { table }
    }

    /// Run both phases and wrap the request on success.
    pub fn admit<R: Request>(&self, request: R) -> Result<Admitted<R>> {
        let kind = request.kind();
        let rules = self.check_structure(&request)?;
        trace!(?kind, state = ?GateState::StructurallyValid, "gate phase 1 passed");

        let (scope, registration_id, instance_id) = self.check_authorization(&request, rules)?;
        trace!(?kind, %scope, state = ?GateState::Accepted, "request admitted");

        Ok(Admitted {
            request,
            scope,
            registration_id,
            instance_id,
        })
    }

    /// Phase 1: every required field present and non-blank.
    ///
    /// Returns the rule list so phase 2 can walk the same fields.
    pub fn check_structure<R: Request>(&self, request: &R) -> Result<&'static [FieldRule]> {
        let kind = request.kind();
        let rules = rules_for(self.table, kind).ok_or_else(|| {
            debug!(?kind, "no rule set for request kind");
            GateError::UnsupportedRequest(kind)
        })?;

        for rule in rules {
            let blank = request
                .field(rule.field)
                .map_or(true, |value| value.trim().is_empty());
            if blank {
                let field = rule.field.wire_name();
                debug!(?kind, field, phase = "structure", "request rejected");
                return Err(GateError::InvalidRequest { field });
            }
        }

        Ok(rules)
    }

    /// Phase 2: every identifier carries the scope the caller claims.
    ///
    /// Assumes phase 1 passed for `rules`.
    #[allow(clippy::type_complexity)]
    pub fn check_authorization<R: Request>(
        &self,
        request: &R,
        rules: &[FieldRule],
    ) -> Result<(AccessScope, Option<RegistrationId>, Option<InstanceId>)> {
        let kind = request.kind();
        let reject = |reason: &'static str| {
            debug!(?kind, reason, phase = "authorization", "request rejected");
            GateError::Unauthorized
        };

        let claim = rules
            .iter()
            .find(|rule| rule.check == Check::Claim)
            .and_then(|rule| request.field(rule.field))
            .ok_or_else(|| reject("no access claim"))?;
        // A claim that is not a valid scope cannot match any identifier.
        let scope = AccessScope::new(claim).map_err(|_| reject("invalid access claim"))?;

        let mut registration_id = None;
        let mut instance_id = None;

        for rule in rules.iter().filter(|rule| rule.check == Check::Identifier) {
            let raw = request.field(rule.field).unwrap_or_default();
            let malformed = |source: CoreError| {
                let field = rule.field.wire_name();
                debug!(?kind, field, phase = "authorization", "malformed identifier");
                GateError::MalformedIdentifier { field, source }
            };

            let embedded = match rule.field {
                Field::RegistrationId => {
                    let id = RegistrationId::parse(raw).map_err(malformed)?;
                    let embedded = id.scope();
                    registration_id = Some(id);
                    embedded
                }
                Field::InstanceId => {
                    let id = InstanceId::parse(raw).map_err(malformed)?;
                    let embedded = id.scope();
                    instance_id = Some(id);
                    embedded
                }
                _ => nebula_history_core::extract_access_scope(raw).map_err(malformed)?,
            };

            if embedded != scope {
                return Err(reject("scope mismatch"));
            }
        }

        trace!(?kind, state = ?GateState::Authorized, "gate phase 2 passed");
        Ok((scope, registration_id, instance_id))
    }

    /// Whether a kind is covered by the table.
    pub fn supports(&self, kind: RequestKind) -> bool {
        rules_for(self.table, kind).is_some()
    }
}
