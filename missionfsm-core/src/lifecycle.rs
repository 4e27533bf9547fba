//! Default lifecycle states and triggers.
//!
//! Every machine starts in INIT and finishes in DONE (success) or ABORTED
//! (failure). Two wildcard triggers are registered by default: `end`, which
//! routes any live state to DONE, and `abort`, the explicit external abort
//! that routes any live state to ABORTED. The `start` trigger is only named
//! here; the mission decides where it leads.

use crate::table::{StateDef, StateKind, Transition};

/// Names of the lifecycle states and default triggers of one machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
    pub init: String,
    pub aborted: String,
    pub done: String,
    pub start: String,
    pub end: String,
    pub abort: String,
}

impl Lifecycle {
    /// Default names for a machine: `REACH_INIT`, `reach_start`, ...
    pub fn for_machine(name: &str) -> Self {
        let upper = name.to_uppercase();
        let lower = name.to_lowercase();
        Self {
            init: format!("{}_INIT", upper),
            aborted: format!("{}_ABORTED", upper),
            done: format!("{}_DONE", upper),
            start: format!("{}_start", lower),
            end: format!("{}_end", lower),
            abort: format!("{}_abort", lower),
        }
    }

    /// Explicit names, e.g. plain `INIT`/`DONE`/`ABORTED`.
    pub fn new(
        init: impl Into<String>,
        aborted: impl Into<String>,
        done: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
        abort: impl Into<String>,
    ) -> Self {
        Self {
            init: init.into(),
            aborted: aborted.into(),
            done: done.into(),
            start: start.into(),
            end: end.into(),
            abort: abort.into(),
        }
    }

    pub fn states(&self) -> Vec<StateDef> {
        vec![
            StateDef::new(&self.init, StateKind::Init),
            StateDef::new(&self.aborted, StateKind::Aborted),
            StateDef::new(&self.done, StateKind::Done),
        ]
    }

    pub fn transitions(&self) -> Vec<Transition> {
        vec![
            Transition::from_any(&self.end, &self.done),
            Transition::from_any(&self.abort, &self.aborted),
        ]
    }
}
