//! Per-state scene metadata.
//!
//! A scene says what happens in a state:
//!
//! - [`Scene::Action`] - a preparation action invoked on entry, with
//!   positional arguments; the state then leaves by its single trigger
//! - [`Scene::Condition`] - a condition evaluated on step whose outcome
//!   selects the next trigger through an [`OutcomeMap`]
//! - [`Scene::SubMachine`] - a nested machine whose whole run stands in for
//!   the state; its result is mapped like a condition outcome
//!
//! The variants are exclusive, so a delegated state can never also carry a
//! local condition.

use crate::callback::{CallbackError, Outcome};
use crate::error::CoreError;
use crate::literal::Literal;
use crate::machine::SharedMachine;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// What a preparation action sees when its state is entered.
#[derive(Debug, Clone, Copy)]
pub struct FireContext<'a> {
    pub machine: &'a str,
    pub source: &'a str,
    pub trigger: &'a str,
    pub dest: &'a str,
    pub data: &'a Value,
}

/// Preparation action run on state entry.
pub trait Action: Send {
    fn prepare(&mut self, ctx: &FireContext<'_>, args: &[Literal]) -> Result<(), CallbackError>;
}

impl<F> Action for F
where
    F: FnMut(&FireContext<'_>, &[Literal]) -> Result<(), CallbackError> + Send,
{
    fn prepare(&mut self, ctx: &FireContext<'_>, args: &[Literal]) -> Result<(), CallbackError> {
        self(ctx, args)
    }
}

/// Zero-argument condition returning a discrete outcome.
pub trait Condition: Send {
    fn evaluate(&mut self) -> Result<Outcome, CallbackError>;
}

impl<F, O> Condition for F
where
    F: FnMut() -> Result<O, CallbackError> + Send,
    O: Into<Outcome>,
{
    fn evaluate(&mut self) -> Result<Outcome, CallbackError> {
        self().map(Into::into)
    }
}

/// Maps an outcome onto the parent's trigger vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeMap {
    pub on_success: String,
    pub on_failure: String,
    /// Trigger fired when the condition itself fails. Falls back to
    /// `on_failure` when unset.
    pub on_error: Option<String>,
}

impl OutcomeMap {
    pub fn new(on_success: impl Into<String>, on_failure: impl Into<String>) -> Self {
        Self {
            on_success: on_success.into(),
            on_failure: on_failure.into(),
            on_error: None,
        }
    }

    /// Routes callback failures to `trigger`, e.g. the abort trigger.
    pub fn escalate_errors_to(mut self, trigger: impl Into<String>) -> Self {
        self.on_error = Some(trigger.into());
        self
    }

    pub fn trigger_for(&self, outcome: Outcome) -> &str {
        match outcome {
            Outcome::Succeeded => &self.on_success,
            Outcome::Failed => &self.on_failure,
        }
    }

    pub fn error_trigger(&self) -> &str {
        self.on_error.as_deref().unwrap_or(&self.on_failure)
    }

    pub fn triggers(&self) -> impl Iterator<Item = &str> {
        [Some(self.on_success.as_str()), Some(self.on_failure.as_str()), self.on_error.as_deref()]
            .into_iter()
            .flatten()
    }
}

/// Discriminant of a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKind {
    Action,
    Condition,
    SubMachine,
}

/// What happens in one state.
pub enum Scene {
    Action {
        action: Box<dyn Action>,
        args: Vec<Literal>,
    },
    Condition {
        condition: Box<dyn Condition>,
        outcomes: OutcomeMap,
    },
    SubMachine {
        machine: SharedMachine,
        outcomes: OutcomeMap,
    },
}

impl Scene {
    pub fn action<A>(action: A, args: Vec<Literal>) -> Self
    where
        A: Action + 'static,
    {
        Scene::Action {
            action: Box::new(action),
            args,
        }
    }

    pub fn condition<C>(condition: C, outcomes: OutcomeMap) -> Self
    where
        C: Condition + 'static,
    {
        Scene::Condition {
            condition: Box::new(condition),
            outcomes,
        }
    }

    pub fn sub_machine(machine: SharedMachine, outcomes: OutcomeMap) -> Self {
        Scene::SubMachine { machine, outcomes }
    }

    pub fn kind(&self) -> SceneKind {
        match self {
            Scene::Action { .. } => SceneKind::Action,
            Scene::Condition { .. } => SceneKind::Condition,
            Scene::SubMachine { .. } => SceneKind::SubMachine,
        }
    }

    /// Outcome mapping for condition and sub-machine scenes.
    pub fn outcomes(&self) -> Option<&OutcomeMap> {
        match self {
            Scene::Action { .. } => None,
            Scene::Condition { outcomes, .. } | Scene::SubMachine { outcomes, .. } => {
                Some(outcomes)
            }
        }
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scene::Action { args, .. } => f.debug_struct("Action").field("args", args).finish(),
            Scene::Condition { outcomes, .. } => f
                .debug_struct("Condition")
                .field("outcomes", outcomes)
                .finish(),
            Scene::SubMachine { machine, outcomes } => {
                let name = machine
                    .try_lock()
                    .map(|m| m.name().to_string())
                    .unwrap_or_else(|| "<running>".to_string());
                f.debug_struct("SubMachine")
                    .field("machine", &name)
                    .field("outcomes", outcomes)
                    .finish()
            }
        }
    }
}

/// Scenes keyed by state name.
#[derive(Debug, Default)]
pub struct SceneRegistry {
    entries: HashMap<String, Scene>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a scene to a state. A state holds at most one scene.
    pub fn insert(&mut self, state: impl Into<String>, scene: Scene) -> Result<(), CoreError> {
        let state = state.into();
        if let Some(existing) = self.entries.get(&state) {
            return Err(CoreError::configuration(format!(
                "state '{}' already has a {:?} scene",
                state,
                existing.kind()
            )));
        }
        self.entries.insert(state, scene);
        Ok(())
    }

    pub fn get(&self, state: &str) -> Option<&Scene> {
        self.entries.get(state)
    }

    pub fn get_mut(&mut self, state: &str) -> Option<&mut Scene> {
        self.entries.get_mut(state)
    }

    pub fn contains(&self, state: &str) -> bool {
        self.entries.contains_key(state)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scene)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
