//! Lifecycle state of a workflow instance.
//!
//! The state is never stored. It is recomputed from the instance's
//! `WorkflowScheduled` and `WorkflowCompleted` events each time it is asked for.

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// The derived execution state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Scheduled, not yet completed.
    Running,
    /// Both lifecycle events present.
    Completed,
}

impl LifecycleState {
    /// Derive the state from the two lifecycle point lookups.
    ///
    /// Returns `None` when the instance was never scheduled; such an instance
    /// does not exist as far as history is concerned.
    pub fn derive(scheduled: Option<&Event>, completed: Option<&Event>) -> Option<Self> {
        match (scheduled, completed) {
            (None, _) => None,
            (Some(_), None) => Some(Self::Running),
            (Some(_), Some(_)) => Some(Self::Completed),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}
