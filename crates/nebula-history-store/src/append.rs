//! Append admission: the per-instance invariants every backend enforces.
//!
//! Backends load an [`InstanceHead`] under their per-instance serialization
//! and run [`check_append`] before writing. Keeping the rules here means the
//! SQLite and in-memory stores cannot drift apart.

use nebula_history_core::{EventType, NewEvent, RegistrationId};

use crate::error::{Result, StoreError};

/// What the store knows about an instance before an append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceHead {
    /// The registration recorded by the first event, if any.
    pub registration: Option<RegistrationId>,
    /// Highest sequence number assigned so far (0 when empty).
    pub last_sequence: u64,
    pub has_scheduled: bool,
    pub has_completed: bool,
}

impl InstanceHead {
    /// Update the head after a successful append.
    pub fn record(&mut self, event: &NewEvent, sequence: u64) {
        if self.registration.is_none() {
            self.registration = Some(event.registration_id.clone());
        }
        self.last_sequence = sequence;
        match event.event_type {
            EventType::WorkflowScheduled => self.has_scheduled = true,
            EventType::WorkflowCompleted => self.has_completed = true,
            _ => {}
        }
    }
}

/// Validate an append against the instance head.
///
/// Returns the sequence number the event will receive.
pub fn check_append(head: &InstanceHead, event: &NewEvent) -> Result<u64> {
    let instance = &event.instance_id;

    match &head.registration {
        None => {
            // Only WorkflowScheduled opens an instance.
            match event.event_type {
                EventType::WorkflowScheduled => {}
                EventType::WorkflowCompleted => {
                    return Err(StoreError::OutOfOrderEvent {
                        instance: instance.clone(),
                    })
                }
                other => {
                    return Err(StoreError::UnknownRegistration {
                        instance: instance.clone(),
                        event_type: other,
                    })
                }
            }
            if event.registration_id.scope() != instance.scope() {
                return Err(StoreError::ScopeMismatch {
                    registration: event.registration_id.clone(),
                    instance: instance.clone(),
                });
            }
        }
        Some(recorded) => {
            if recorded != &event.registration_id {
                return Err(StoreError::RegistrationMismatch {
                    instance: instance.clone(),
                    recorded: recorded.clone(),
                    requested: event.registration_id.clone(),
                });
            }
            match event.event_type {
                EventType::WorkflowScheduled if head.has_scheduled => {
                    return Err(StoreError::DuplicateLifecycleEvent {
                        instance: instance.clone(),
                        event_type: EventType::WorkflowScheduled,
                    })
                }
                EventType::WorkflowCompleted if head.has_completed => {
                    return Err(StoreError::DuplicateLifecycleEvent {
                        instance: instance.clone(),
                        event_type: EventType::WorkflowCompleted,
                    })
                }
                EventType::WorkflowCompleted if !head.has_scheduled => {
                    return Err(StoreError::OutOfOrderEvent {
                        instance: instance.clone(),
                    })
                }
                _ => {}
            }
        }
    }

    Ok(head.last_sequence + 1)
}

/// A batch append must target a single instance.
pub fn check_batch(events: &[NewEvent]) -> Result<()> {
    let Some(first) = events.first() else {
        return Ok(());
    };
    match events.iter().find(|e| e.instance_id != first.instance_id) {
        Some(other) => Err(StoreError::MixedBatch {
            first: first.instance_id.clone(),
            other: other.instance_id.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_history_core::{AccessScope, InstanceId};

    fn event(scope: &str, instance_scope: &str, event_type: EventType) -> NewEvent {
        let reg_scope = AccessScope::new(scope).unwrap();
        let inst_scope = AccessScope::new(instance_scope).unwrap();
        NewEvent::new(
            RegistrationId::new(&reg_scope, "reg").unwrap(),
            InstanceId::new(&inst_scope, "run").unwrap(),
            event_type,
            Vec::new(),
        )
    }

    fn scheduled_head() -> InstanceHead {
        let mut head = InstanceHead::default();
        head.record(&event("acc1", "acc1", EventType::WorkflowScheduled), 1);
        head
    }

    #[test]
    fn test_scheduled_opens_instance() {
        let opening = event("acc1", "acc1", EventType::WorkflowScheduled);
        assert_eq!(check_append(&InstanceHead::default(), &opening).unwrap(), 1);
    }

    #[test]
    fn test_completed_on_fresh_instance_is_out_of_order() {
        let early = event("acc1", "acc1", EventType::WorkflowCompleted);
        let result = check_append(&InstanceHead::default(), &early);
        assert!(matches!(result, Err(StoreError::OutOfOrderEvent { .. })));
    }

    #[test]
    fn test_other_event_on_fresh_instance_is_unknown_registration() {
        let orphan = event("acc1", "acc1", EventType::ActivityScheduled);
        let result = check_append(&InstanceHead::default(), &orphan);
        assert!(matches!(
            result,
            Err(StoreError::UnknownRegistration {
                event_type: EventType::ActivityScheduled,
                ..
            })
        ));
    }

    #[test]
    fn test_scope_mismatch_on_open() {
        let crossed = event("acc1", "acc2", EventType::WorkflowScheduled);
        let result = check_append(&InstanceHead::default(), &crossed);
        assert!(matches!(result, Err(StoreError::ScopeMismatch { .. })));
    }

    #[test]
    fn test_duplicate_scheduled() {
        let again = event("acc1", "acc1", EventType::WorkflowScheduled);
        let result = check_append(&scheduled_head(), &again);
        assert!(matches!(
            result,
            Err(StoreError::DuplicateLifecycleEvent {
                event_type: EventType::WorkflowScheduled,
                ..
            })
        ));
    }

    #[test]
    fn test_duplicate_completed() {
        let mut head = scheduled_head();
        head.record(&event("acc1", "acc1", EventType::WorkflowCompleted), 2);

        let result = check_append(&head, &event("acc1", "acc1", EventType::WorkflowCompleted));
        assert!(matches!(
            result,
            Err(StoreError::DuplicateLifecycleEvent {
                event_type: EventType::WorkflowCompleted,
                ..
            })
        ));
    }

    #[test]
    fn test_registration_is_immutable() {
        let scope = AccessScope::new("acc1").unwrap();
        let other = NewEvent::new(
            RegistrationId::new(&scope, "other-reg").unwrap(),
            InstanceId::new(&scope, "run").unwrap(),
            EventType::ActivityScheduled,
            Vec::new(),
        );
        let result = check_append(&scheduled_head(), &other);
        assert!(matches!(result, Err(StoreError::RegistrationMismatch { .. })));
    }

    #[test]
    fn test_next_sequence() {
        let mut head = scheduled_head();
        head.record(&event("acc1", "acc1", EventType::DecisionScheduled), 2);
        let seq = check_append(&head, &event("acc1", "acc1", EventType::WorkflowCompleted));
        assert_eq!(seq.unwrap(), 3);
    }

    #[test]
    fn test_batch_must_target_one_instance() {
        let scope = AccessScope::new("acc1").unwrap();
        let registration = RegistrationId::new(&scope, "reg").unwrap();
        let elsewhere = NewEvent::new(
            registration,
            InstanceId::new(&scope, "other-run").unwrap(),
            EventType::WorkflowScheduled,
            Vec::new(),
        );
        let opening = event("acc1", "acc1", EventType::WorkflowScheduled);

        assert!(check_batch(&[]).is_ok());
        assert!(check_batch(&[opening.clone(), opening.clone()]).is_ok());
        assert!(matches!(
            check_batch(&[opening, elsewhere]),
            Err(StoreError::MixedBatch { .. })
        ));
    }
}
