//! Lifecycle of a server attempt.
//!
//! ```text
//! Uninitialized → Running → Submitting → Submitted
//! ```
//!
//! Every move is checked by [`AttemptState::advance`], anything else is an
//! [`IllegalTransition`].

use std::fmt;
use std::time::Duration;

use super::api::AttemptId;

/// Name of a lifecycle step, without its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// No attempt created yet.
    Uninitialized,
    /// Problems fetched, the solver is running.
    Running,
    /// Every problem has a result, sending them.
    Submitting,
    /// The server accepted the results.
    Submitted,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Running => write!(f, "Running"),
            Self::Submitting => write!(f, "Submitting"),
            Self::Submitted => write!(f, "Submitted"),
        }
    }
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal attempt transition: {from} → {to}")]
pub struct IllegalTransition {
    /// Current state.
    pub from: Status,
    /// Refused target.
    pub to: Status,
}

/// State of one attempt, owned by the benchmarker running it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttemptState {
    /// No attempt created yet.
    #[default]
    Uninitialized,
    /// The server created `attempt`; `timeout` is the budget in effect.
    Running {
        /// Server side identifier.
        attempt: AttemptId,
        /// Per-problem budget used by the bench.
        timeout: Option<Duration>,
    },
    /// Results of `attempt` are being sent.
    Submitting {
        /// Server side identifier.
        attempt: AttemptId,
    },
    /// Results of `attempt` were accepted.
    Submitted {
        /// Server side identifier.
        attempt: AttemptId,
    },
}

impl AttemptState {
    /// Lifecycle step of this state.
    pub fn status(&self) -> Status {
        match self {
            AttemptState::Uninitialized => Status::Uninitialized,
            AttemptState::Running { .. } => Status::Running,
            AttemptState::Submitting { .. } => Status::Submitting,
            AttemptState::Submitted { .. } => Status::Submitted,
        }
    }

    /// The attempt identifier, once created.
    pub fn attempt(&self) -> Option<&AttemptId> {
        match self {
            AttemptState::Uninitialized => None,
            AttemptState::Running { attempt, .. }
            | AttemptState::Submitting { attempt }
            | AttemptState::Submitted { attempt } => Some(attempt),
        }
    }

    /// Move to `next` if the lifecycle allows it.
    ///
    /// On error the state is left untouched.
    pub fn advance(&mut self, next: AttemptState) -> Result<(), IllegalTransition> {
        let (from, to) = (self.status(), next.status());
        if !is_legal_transition(from, to) {
            return Err(IllegalTransition { from, to });
        }
        *self = next;
        Ok(())
    }
}

fn is_legal_transition(from: Status, to: Status) -> bool {
    use Status::*;

    matches!(
        (from, to),
        (Uninitialized, Running) | (Running, Submitting) | (Submitting, Submitted)
    )
}
