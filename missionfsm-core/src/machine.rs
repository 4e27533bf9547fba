//! Capability interface for runnable machines and sub-machine delegation.
//!
//! A parent state delegates to anything implementing [`Machine`]; the parent
//! never inspects the concrete type. Delegation always resets the nested
//! machine to its INIT state first, so a sub-machine can be visited any
//! number of times across parent runs.

use crate::callback::Outcome;
use crate::error::CoreError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Terminal result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Done,
    Aborted,
}

impl RunOutcome {
    /// Integer convention: 1 for DONE, 0 for ABORTED.
    pub fn code(self) -> i32 {
        match self {
            RunOutcome::Done => 1,
            RunOutcome::Aborted => 0,
        }
    }

    pub fn is_success(self) -> bool {
        self == RunOutcome::Done
    }
}

impl From<RunOutcome> for Outcome {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Done => Outcome::Succeeded,
            RunOutcome::Aborted => Outcome::Failed,
        }
    }
}

/// Operations a machine must expose to be embedded as a sub-machine.
pub trait Machine: Send {
    fn name(&self) -> &str;

    fn current_state(&self) -> &str;

    /// Returns to INIT and clears per-run counters.
    fn reset(&mut self);

    fn set_state(&mut self, state: &str) -> Result<(), CoreError>;

    fn step(&mut self) -> Result<(), CoreError>;

    fn run(&mut self) -> Result<RunOutcome, CoreError>;
}

/// A machine shared between its owner and the parent scene delegating to it.
pub type SharedMachine = Arc<Mutex<dyn Machine>>;

/// Wraps a machine for sharing. The returned handle coerces to
/// [`SharedMachine`] while keeping concrete access for the owner.
pub fn shared<M: Machine + 'static>(machine: M) -> Arc<Mutex<M>> {
    Arc::new(Mutex::new(machine))
}

/// Runs the nested machine of `state` to completion and returns its outcome.
pub(crate) fn delegate(state: &str, machine: &SharedMachine) -> Result<Outcome, CoreError> {
    // A machine already locked is on the current call stack
    let mut nested = machine.try_lock().ok_or_else(|| {
        CoreError::configuration(format!(
            "sub-machine of '{}' is already running (recursive delegation)",
            state
        ))
    })?;

    nested.reset();
    tracing::debug!(state, machine = nested.name(), "delegating to sub-machine");

    let result = nested.run().map_err(|e| CoreError::SubMachine {
        state: state.to_string(),
        source: Box::new(e),
    })?;

    tracing::debug!(
        state,
        machine = nested.name(),
        outcome = ?result,
        "sub-machine finished"
    );
    Ok(result.into())
}
