//! Several mission instances sharing one parent table.

use missionfsm_core::{StateKind, StateMachineEngine};
use missionfsm_mission::{
    splice, MissionTemplate, Namespace, ReachMission, ReachParams, RecordingActuator,
    ScriptedPerception,
};
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

fn template() -> ReachMission {
    ReachMission::new(
        "front",
        "gate",
        Arc::new(ScriptedPerception::new()),
        Arc::new(RecordingActuator::new()),
    )
    .with_params(ReachParams::instant())
    .with_avoid(["mat"])
}

/// Fragment names of one instance: (states, triggers).
fn names(engine: &mut StateMachineEngine, instance: &str) -> (HashSet<String>, HashSet<String>) {
    let ns = Namespace::new(instance).unwrap();
    let lifecycle = engine.lifecycle().clone();
    let fragment = template().fragment(&ns, &lifecycle).unwrap();

    let states: HashSet<String> = fragment.states.iter().cloned().collect();
    let triggers: HashSet<String> = fragment
        .transitions
        .iter()
        .map(|t| t.trigger.clone())
        .collect();

    splice(engine, fragment).unwrap();
    (states, triggers)
}

proptest! {
    #[test]
    fn instances_do_not_collide(
        a in "[a-z][a-z0-9]{0,5}",
        b in "[a-z][a-z0-9]{0,5}",
    ) {
        prop_assume!(a != b);

        let mut engine = StateMachineEngine::new("parent").unwrap();
        let (states_a, triggers_a) = names(&mut engine, &a);
        let (states_b, triggers_b) = names(&mut engine, &b);

        prop_assert!(states_a.is_disjoint(&states_b));
        prop_assert!(triggers_a.is_disjoint(&triggers_b));

        // Every trigger of instance A stays inside A or the lifecycle
        for state in &states_a {
            engine.set_state(state).unwrap();
            for trigger in &triggers_a {
                if let Some(t) = engine.table().resolve(state, trigger) {
                    let kind = engine.table().kind(&t.dest);
                    prop_assert!(
                        states_a.contains(&t.dest) || kind != Some(StateKind::Ordinary),
                        "{} --{}--> {}", state, trigger, t.dest
                    );
                    engine.fire(trigger, &json!({})).unwrap();
                    prop_assert!(!states_b.contains(engine.current_state()));
                    engine.set_state(state).unwrap();
                }
            }
        }
    }
}

#[test]
fn test_same_instance_twice_is_rejected() {
    let mut engine = StateMachineEngine::new("parent").unwrap();
    names(&mut engine, "gate");

    let ns = Namespace::new("gate").unwrap();
    let lifecycle = engine.lifecycle().clone();
    let fragment = template().fragment(&ns, &lifecycle).unwrap();
    assert!(splice(&mut engine, fragment).is_err());
}
