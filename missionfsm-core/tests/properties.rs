//! Property tests for run termination, reset idempotence and rulebook
//! round trips.

use missionfsm_core::{
    CallbackError, Lifecycle, OutcomeMap, Rulebook, RunOutcome, Scene, StateMachineEngine,
    Transition,
};
use proptest::prelude::*;
use proptest::sample::Index;

fn lifecycle() -> Lifecycle {
    Lifecycle::new("INIT", "ABORTED", "DONE", "start", "end", "abort")
}

/// INIT -> CHECK_0 -> ... -> CHECK_n -> DONE, where a failed check aborts.
fn chain(results: &[bool]) -> StateMachineEngine {
    let mut engine = StateMachineEngine::with_lifecycle("chain", lifecycle()).unwrap();
    let names: Vec<String> = (0..results.len()).map(|i| format!("CHECK_{i}")).collect();

    let mut transitions = vec![Transition::new("start", "INIT", names[0].as_str())];
    for (i, name) in names.iter().enumerate() {
        let next = names.get(i + 1).map_or("DONE", String::as_str);
        transitions.push(Transition::new(format!("pass_{i}"), name.as_str(), next));
        transitions.push(Transition::new(format!("fail_{i}"), name.as_str(), "ABORTED"));
    }
    engine.register(names.iter().cloned(), transitions).unwrap();

    for (i, (name, &result)) in names.iter().zip(results).enumerate() {
        engine
            .register_scene(
                name.as_str(),
                Scene::condition(
                    move || Ok::<_, CallbackError>(result),
                    OutcomeMap::new(format!("pass_{i}"), format!("fail_{i}")),
                ),
            )
            .unwrap();
    }
    engine
}

fn expected(results: &[bool]) -> (RunOutcome, u64) {
    match results.iter().position(|r| !r) {
        Some(first_failure) => (RunOutcome::Aborted, first_failure as u64 + 2),
        None => (RunOutcome::Done, results.len() as u64 + 1),
    }
}

prop_compose! {
    fn arbitrary_rulebook()(
        states in prop::collection::hash_set("[A-Z][A-Za-z0-9_ ']{0,8}", 1..8),
        edges in prop::collection::vec((any::<Index>(), any::<Index>(), 0..4u8), 0..12),
    ) -> Rulebook {
        let states: Vec<String> = states.into_iter().collect();
        let transitions = edges
            .into_iter()
            .enumerate()
            .map(|(i, (from, to, shape))| {
                let trigger = format!("t{i}");
                let dest = to.get(&states).clone();
                match shape {
                    0 => Transition::from_any(trigger, dest),
                    1 => Transition::from_states(trigger, states.iter().take(2).cloned(), dest),
                    _ => Transition::new(trigger, from.get(&states).as_str(), dest),
                }
            })
            .collect();
        Rulebook { states, transitions }
    }
}

proptest! {
    #[test]
    fn run_always_terminates(results in prop::collection::vec(any::<bool>(), 1..20)) {
        let mut engine = chain(&results);
        let outcome = engine.run().unwrap();

        let (want, steps) = expected(&results);
        prop_assert_eq!(outcome, want);
        prop_assert_eq!(engine.step_count(), steps);
        prop_assert!(engine.is_terminal());
    }

    #[test]
    fn reset_then_run_repeats(results in prop::collection::vec(any::<bool>(), 1..10)) {
        let mut engine = chain(&results);
        let first = engine.run().unwrap();
        let first_steps = engine.step_count();

        engine.reset();
        prop_assert_eq!(engine.current_state(), "INIT");
        prop_assert_eq!(engine.step_count(), 0);

        let second = engine.run().unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(first_steps, engine.step_count());
    }

    #[test]
    fn rulebook_text_round_trip(rulebook in arbitrary_rulebook()) {
        let reparsed = Rulebook::parse_str(&rulebook.render()).unwrap();
        prop_assert_eq!(reparsed, rulebook);
    }

    #[test]
    fn table_round_trip_preserves_checksum(rulebook in arbitrary_rulebook()) {
        let table = rulebook.to_table().unwrap();
        let text = missionfsm_core::rulebook::render(&table);
        let reloaded = Rulebook::parse_str(&text).unwrap().to_table().unwrap();

        prop_assert_eq!(table.checksum(), reloaded.checksum());
        prop_assert_eq!(table.states(), reloaded.states());
        prop_assert_eq!(table.transitions(), reloaded.transitions());
    }
}
