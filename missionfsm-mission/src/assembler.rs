//! Mission assembly: namespaced fragments spliced into an engine.
//!
//! A mission template describes its states, transitions and scenes with base
//! names. Every generated name is qualified by the instance namespace, so
//! several instances of one template can share a parent table without
//! colliding:
//!
//! ```text
//! condition_visible + "gate"  ->  condition_visible_gate
//! condition_s       + "gate"  ->  condition_s_gate
//! ```

use crate::error::MissionError;
use missionfsm_core::{Lifecycle, Scene, StateMachineEngine, Transition};

/// Per-instance name qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    instance: String,
}

impl Namespace {
    pub fn new(instance: impl Into<String>) -> Result<Self, MissionError> {
        let instance = instance.into();
        if instance.trim().is_empty() {
            return Err(MissionError::invalid("namespace", "instance name must not be empty"));
        }
        if instance.contains(char::is_whitespace) || instance.contains('*') {
            return Err(MissionError::invalid(
                "namespace",
                format!("'{}' must not contain whitespace or '*'", instance),
            ));
        }
        Ok(Self { instance })
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Qualifies a base state or trigger name: `base_instance`.
    pub fn qualify(&self, base: &str) -> String {
        format!("{}_{}", base, self.instance)
    }

    /// Machine name for a nested mission of this instance: `instance_role`.
    pub fn child(&self, role: &str) -> String {
        format!("{}_{}", self.instance, role)
    }
}

/// Fully qualified states, transitions and scenes of one mission instance.
#[derive(Debug, Default)]
pub struct Fragment {
    pub states: Vec<String>,
    pub transitions: Vec<Transition>,
    pub scenes: Vec<(String, Scene)>,
    /// State the owner's start trigger leads to.
    pub entry: String,
    /// Preparation for the owner's INIT state, bound only by the assembler.
    pub init_action: Option<Scene>,
}

impl Fragment {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            ..Self::default()
        }
    }

    pub fn state(&mut self, name: impl Into<String>) -> &mut Self {
        self.states.push(name.into());
        self
    }

    pub fn transition(
        &mut self,
        trigger: impl Into<String>,
        source: impl Into<String>,
        dest: impl Into<String>,
    ) -> &mut Self {
        self.transitions.push(Transition::new(trigger, source, dest));
        self
    }

    pub fn scene(&mut self, state: impl Into<String>, scene: Scene) -> &mut Self {
        self.scenes.push((state.into(), scene));
        self
    }
}

/// A reusable mission shape.
pub trait MissionTemplate {
    /// Short name of the mission type, e.g. `reach`.
    fn kind(&self) -> &'static str;

    /// Builds the fragment for one instance.
    fn fragment(&self, namespace: &Namespace, lifecycle: &Lifecycle) -> Result<Fragment, MissionError>;
}

/// What remains of a fragment after splicing.
#[derive(Debug)]
pub struct Spliced {
    pub entry: String,
    pub init_action: Option<Scene>,
}

/// Registers a fragment's states, transitions and scenes into `engine`.
///
/// The fragment's entry state is returned unconnected; the caller decides
/// which trigger leads to it.
pub fn splice(engine: &mut StateMachineEngine, fragment: Fragment) -> Result<Spliced, MissionError> {
    let Fragment {
        states,
        transitions,
        scenes,
        entry,
        init_action,
    } = fragment;

    if !states.contains(&entry) {
        return Err(MissionError::invalid(
            "entry",
            format!("'{}' is not one of the fragment's states", entry),
        ));
    }

    engine.register(states, transitions)?;
    for (state, scene) in scenes {
        engine.register_scene(state, scene)?;
    }

    Ok(Spliced { entry, init_action })
}

/// Builds ready-to-run engines from mission templates.
#[derive(Debug, Clone)]
pub struct MissionAssembler {
    name: String,
    lifecycle: Lifecycle,
    verbose: bool,
}

impl MissionAssembler {
    /// Assembler for a machine called `name` with default lifecycle names.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            lifecycle: Lifecycle::for_machine(&name),
            name,
            verbose: false,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates the engine, splices the template, connects the start trigger
    /// and validates the result.
    pub fn build<T>(&self, template: &T) -> Result<StateMachineEngine, MissionError>
    where
        T: MissionTemplate + ?Sized,
    {
        let namespace = Namespace::new(&self.name)?;
        let mut engine = StateMachineEngine::with_lifecycle(&self.name, self.lifecycle.clone())?;
        engine.set_verbose(self.verbose);

        let fragment = template.fragment(&namespace, &self.lifecycle)?;
        let spliced = splice(&mut engine, fragment)?;

        let start = Transition::new(&self.lifecycle.start, &self.lifecycle.init, spliced.entry);
        engine.register(Vec::<String>::new(), [start])?;
        if let Some(action) = spliced.init_action {
            engine.register_scene(&self.lifecycle.init, action)?;
        }

        engine.validate()?;
        tracing::debug!(
            machine = %self.name,
            mission = template.kind(),
            states = engine.table().states().len(),
            transitions = engine.table().transitions().len(),
            "mission assembled"
        );
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use missionfsm_core::{CallbackError, CoreError, OutcomeMap, RunOutcome};

    /// INIT -> probe -> DONE, or back to INIT's successor on failure.
    struct Probe {
        result: bool,
    }

    impl MissionTemplate for Probe {
        fn kind(&self) -> &'static str {
            "probe"
        }

        fn fragment(&self, ns: &Namespace, lc: &Lifecycle) -> Result<Fragment, MissionError> {
            let probe = ns.qualify("condition_probe");
            let result = self.result;

            let mut fragment = Fragment::new(&probe);
            fragment
                .state(&probe)
                .transition(ns.qualify("condition_s"), &probe, &lc.done)
                .transition(ns.qualify("condition_f"), &probe, &lc.aborted)
                .scene(
                    &probe,
                    Scene::condition(
                        move || Ok::<_, CallbackError>(result),
                        OutcomeMap::new(ns.qualify("condition_s"), ns.qualify("condition_f")),
                    ),
                );
            Ok(fragment)
        }
    }

    #[test]
    fn test_namespace() {
        let ns = Namespace::new("gate").unwrap();
        assert_eq!(ns.qualify("condition_visible"), "condition_visible_gate");
        assert_eq!(ns.child("centering"), "gate_centering");

        assert!(Namespace::new("").is_err());
        assert!(Namespace::new("two words").is_err());
        assert!(Namespace::new("*").is_err());
    }

    #[test]
    fn test_build_connects_start() {
        let mut engine = MissionAssembler::new("probe").build(&Probe { result: true }).unwrap();

        assert_eq!(engine.current_state(), "PROBE_INIT");
        assert_eq!(engine.triggers(), vec!["probe_end", "probe_abort", "probe_start"]);
        assert_eq!(engine.run().unwrap(), RunOutcome::Done);
        assert_eq!(engine.step_count(), 2);

        let mut engine = MissionAssembler::new("probe").build(&Probe { result: false }).unwrap();
        assert_eq!(engine.run().unwrap(), RunOutcome::Aborted);
    }

    #[test]
    fn test_splice_twice_collides() {
        let mut engine = StateMachineEngine::new("parent").unwrap();
        let ns = Namespace::new("a").unwrap();
        let lc = engine.lifecycle().clone();

        splice(&mut engine, Probe { result: true }.fragment(&ns, &lc).unwrap()).unwrap();
        let again = splice(&mut engine, Probe { result: true }.fragment(&ns, &lc).unwrap());
        assert!(matches!(
            again,
            Err(MissionError::Core(CoreError::Configuration { .. }))
        ));
    }

    #[test]
    fn test_entry_must_be_a_fragment_state() {
        let mut engine = StateMachineEngine::new("parent").unwrap();
        let fragment = Fragment::new("nowhere");
        let result = splice(&mut engine, fragment);
        assert!(matches!(result, Err(MissionError::InvalidParameter { .. })));
    }
}
