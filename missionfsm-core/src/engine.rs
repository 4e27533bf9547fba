//! State machine engine - owns a transition table, scenes and the current state.

use crate::callback::{self, CallbackResult};
use crate::diagram;
use crate::error::CoreError;
use crate::lifecycle::Lifecycle;
use crate::machine::{self, Machine, RunOutcome};
use crate::rulebook::Rulebook;
use crate::scene::{FireContext, Scene, SceneRegistry};
use crate::table::{StateDef, StateKind, Transition, TransitionTable};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// The state machine engine.
///
/// Execution is single-threaded: `run()` blocks until DONE or ABORTED and
/// every step is atomic from the engine's point of view. Collaborators may
/// block inside actions, conditions or nested runs.
#[derive(Debug)]
pub struct StateMachineEngine {
    name: String,
    lifecycle: Lifecycle,
    table: TransitionTable,
    scenes: SceneRegistry,
    current: String,
    verbose: bool,
    /// Steps taken since the last reset or run start.
    steps: u64,
}

impl StateMachineEngine {
    /// Creates an engine with the default lifecycle names for `name`.
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        let lifecycle = Lifecycle::for_machine(&name);
        Self::with_lifecycle(name, lifecycle)
    }

    /// Creates an engine with explicit lifecycle names.
    pub fn with_lifecycle(
        name: impl Into<String>,
        lifecycle: Lifecycle,
    ) -> Result<Self, CoreError> {
        let mut table = TransitionTable::new();
        table.register(lifecycle.states(), lifecycle.transitions())?;

        Ok(Self {
            name: name.into(),
            current: lifecycle.init.clone(),
            lifecycle,
            table,
            scenes: SceneRegistry::new(),
            verbose: false,
            steps: 0,
        })
    }

    /// Creates an engine from a parsed rulebook on top of the lifecycle defaults.
    pub fn from_rulebook(
        name: impl Into<String>,
        lifecycle: Lifecycle,
        rulebook: &Rulebook,
    ) -> Result<Self, CoreError> {
        let mut engine = Self::with_lifecycle(name, lifecycle)?;
        engine.register(rulebook.states.iter().cloned(), rulebook.transitions.iter().cloned())?;
        Ok(engine)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Adds ordinary states and transitions.
    pub fn register<S, T>(&mut self, states: S, transitions: T) -> Result<(), CoreError>
    where
        S: IntoIterator,
        S::Item: Into<String>,
        T: IntoIterator<Item = Transition>,
    {
        self.table.register(
            states.into_iter().map(|s| StateDef::ordinary(s)),
            transitions,
        )
    }

    /// Binds a scene to a registered state.
    pub fn register_scene(
        &mut self,
        state: impl Into<String>,
        scene: Scene,
    ) -> Result<(), CoreError> {
        let state = state.into();
        if !self.table.has_state(&state) {
            return Err(CoreError::configuration(format!(
                "scene for undefined state '{}'",
                state
            )));
        }
        self.scenes.insert(state, scene)
    }

    /// Checks that every live state has exactly one way out.
    ///
    /// States with a condition or sub-machine must have a transition for each
    /// trigger in their outcome map. All other non-terminal states must have
    /// exactly one concrete trigger; wildcard triggers are only fired by name.
    pub fn validate(&self) -> Result<(), CoreError> {
        for state in self.table.states() {
            let scene = self.scenes.get(&state.name);

            if state.kind.is_terminal() {
                if scene.and_then(Scene::outcomes).is_some() {
                    return Err(CoreError::configuration(format!(
                        "terminal state '{}' cannot evaluate a condition or sub-machine",
                        state.name
                    )));
                }
                continue;
            }

            match scene.and_then(Scene::outcomes) {
                Some(outcomes) => {
                    for trigger in outcomes.triggers() {
                        if self.table.resolve(&state.name, trigger).is_none() {
                            return Err(CoreError::configuration(format!(
                                "state '{}' maps an outcome to '{}', which has no transition from it",
                                state.name, trigger
                            )));
                        }
                    }
                }
                None => {
                    self.single_trigger(&state.name)?;
                }
            }
        }

        Ok(())
    }

    // =========================================================================
    // State inspection
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn scenes(&self) -> &SceneRegistry {
        &self.scenes
    }

    pub fn current_state(&self) -> &str {
        &self.current
    }

    /// Returns true once the engine sits in DONE or ABORTED.
    pub fn is_terminal(&self) -> bool {
        self.table
            .kind(&self.current)
            .is_some_and(StateKind::is_terminal)
    }

    /// Triggers that resolve from the current state.
    pub fn triggers(&self) -> Vec<&str> {
        self.table.triggers_from(&self.current)
    }

    /// Steps taken since the last reset or the start of the last run.
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Force-sets the current state.
    pub fn set_state(&mut self, state: &str) -> Result<(), CoreError> {
        if !self.table.has_state(state) {
            return Err(CoreError::InvalidState {
                state: state.to_string(),
            });
        }
        self.current = state.to_string();
        Ok(())
    }

    /// Returns to INIT and clears the step counter.
    pub fn reset(&mut self) {
        self.current = self.lifecycle.init.clone();
        self.steps = 0;
    }

    /// Fires `trigger` from the current state.
    ///
    /// The destination's preparation action, if any, runs before the current
    /// state changes. A failing action leaves the current state untouched.
    pub fn fire(&mut self, trigger: &str, context: &Value) -> Result<(), CoreError> {
        let dest = self
            .table
            .resolve(&self.current, trigger)
            .map(|t| t.dest.clone())
            .ok_or_else(|| CoreError::NoMatchingTransition {
                state: self.current.clone(),
                trigger: trigger.to_string(),
            })?;

        self.enter(trigger, &dest, context)?;

        tracing::trace!(
            machine = %self.name,
            from = %self.current,
            to = %dest,
            trigger,
            "transition"
        );
        self.current = dest;
        Ok(())
    }

    /// Decides the next trigger for the current state and fires it.
    ///
    /// Stepping a terminal state does nothing. Only steps whose transition
    /// completes are counted.
    pub fn step(&mut self) -> Result<(), CoreError> {
        if self.is_terminal() {
            return Ok(());
        }

        let trigger = self.select_trigger()?;

        if self.verbose {
            tracing::info!(
                machine = %self.name,
                state = %self.current,
                trigger = %trigger,
                "step"
            );
        }

        let context = json!({ "state_name": self.current });
        self.fire(&trigger, &context)?;
        self.steps += 1;
        Ok(())
    }

    /// Steps until DONE or ABORTED.
    pub fn run(&mut self) -> Result<RunOutcome, CoreError> {
        self.validate()?;
        self.steps = 0;
        tracing::debug!(machine = %self.name, state = %self.current, "run started");

        // INIT is entered by reset rather than by a trigger
        if self.current == self.lifecycle.init {
            let init = self.lifecycle.init.clone();
            let context = json!({ "state_name": init });
            self.enter("", &init, &context)?;
        }

        loop {
            match self.table.kind(&self.current) {
                Some(StateKind::Done) => return Ok(self.finish(RunOutcome::Done)),
                Some(StateKind::Aborted) => return Ok(self.finish(RunOutcome::Aborted)),
                Some(_) => self.step()?,
                None => {
                    return Err(CoreError::Termination {
                        state: self.current.clone(),
                    })
                }
            }
        }
    }

    fn finish(&self, outcome: RunOutcome) -> RunOutcome {
        tracing::debug!(
            machine = %self.name,
            state = %self.current,
            steps = self.steps,
            outcome = ?outcome,
            "run finished"
        );
        outcome
    }

    /// Runs the preparation action of `dest`, if it has one.
    fn enter(&mut self, trigger: &str, dest: &str, context: &Value) -> Result<(), CoreError> {
        let Some(Scene::Action { action, args }) = self.scenes.get_mut(dest) else {
            return Ok(());
        };

        let ctx = FireContext {
            machine: &self.name,
            source: &self.current,
            trigger,
            dest,
            data: context,
        };

        match callback::invoke(&ctx, |ctx| action.prepare(ctx, args)) {
            CallbackResult::Ok(()) => Ok(()),
            CallbackResult::Failed(reason) => Err(CoreError::Action {
                state: dest.to_string(),
                reason,
            }),
        }
    }

    fn select_trigger(&mut self) -> Result<String, CoreError> {
        let state = self.current.clone();

        let decided = match self.scenes.get_mut(&state) {
            Some(Scene::Condition {
                condition,
                outcomes,
            }) => {
                let context = json!({ "state_name": state });
                let trigger = match callback::invoke(&context, |_| condition.evaluate()) {
                    CallbackResult::Ok(outcome) => {
                        tracing::debug!(state = %state, outcome = ?outcome, "condition evaluated");
                        outcomes.trigger_for(outcome)
                    }
                    CallbackResult::Failed(reason) => {
                        tracing::warn!(state = %state, reason = %reason, "condition failed");
                        outcomes.error_trigger()
                    }
                };
                Some(trigger.to_string())
            }
            Some(Scene::SubMachine { machine, outcomes }) => {
                let outcome = machine::delegate(&state, machine)?;
                Some(outcomes.trigger_for(outcome).to_string())
            }
            Some(Scene::Action { .. }) | None => None,
        };

        match decided {
            Some(trigger) => Ok(trigger),
            None => self.single_trigger(&state).map(str::to_string),
        }
    }

    /// The only concrete trigger leaving `state`.
    fn single_trigger(&self, state: &str) -> Result<&str, CoreError> {
        let triggers = self.table.concrete_triggers(state);
        match triggers.as_slice() {
            [only] => Ok(*only),
            [] => Err(CoreError::configuration(format!(
                "state '{}' has no outgoing trigger and no condition",
                state
            ))),
            many => Err(CoreError::configuration(format!(
                "state '{}' has several triggers ({}) and no condition to choose between them",
                state,
                many.join(", ")
            ))),
        }
    }

    // =========================================================================
    // Diagrams
    // =========================================================================

    /// Renders the current table as a Graphviz DOT document.
    pub fn to_dot(&self) -> String {
        diagram::to_dot(&self.name, &self.table, Some(&self.current))
    }

    /// Writes `<name>_machine_diagram.dot` into `dir`.
    pub fn describe(&self, dir: impl AsRef<Path>) -> Result<PathBuf, CoreError> {
        let path = dir
            .as_ref()
            .join(format!("{}_machine_diagram.dot", self.name));
        std::fs::write(&path, self.to_dot())?;
        tracing::info!(machine = %self.name, path = %path.display(), "diagram written");
        Ok(path)
    }
}

impl Machine for StateMachineEngine {
    fn name(&self) -> &str {
        StateMachineEngine::name(self)
    }

    fn current_state(&self) -> &str {
        StateMachineEngine::current_state(self)
    }

    fn reset(&mut self) {
        StateMachineEngine::reset(self)
    }

    fn set_state(&mut self, state: &str) -> Result<(), CoreError> {
        StateMachineEngine::set_state(self, state)
    }

    fn step(&mut self) -> Result<(), CoreError> {
        StateMachineEngine::step(self)
    }

    fn run(&mut self) -> Result<RunOutcome, CoreError> {
        StateMachineEngine::run(self)
    }
}
