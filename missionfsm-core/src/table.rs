//! Transition table: named states plus (trigger, source, dest) transitions.
//!
//! A table is plain data with lookup. Consistency is enforced on insertion:
//!
//! - every concrete source and every destination names a registered state
//! - a (state, trigger) pair resolves to at most one transition, counting
//!   wildcard sources as covering every state
//! - there is at most one INIT, one ABORTED and one DONE state
//!
//! Registration is all-or-nothing: a rejected batch leaves the table as it was.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wildcard source marker used in rulebooks and diagrams.
pub const WILDCARD: &str = "*";

/// Lifecycle role of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    Init,
    Aborted,
    Done,
    Ordinary,
}

impl StateKind {
    /// Terminal states never resolve outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, StateKind::Aborted | StateKind::Done)
    }
}

/// A registered state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDef {
    pub name: String,
    pub kind: StateKind,
}

impl StateDef {
    pub fn new(name: impl Into<String>, kind: StateKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn ordinary(name: impl Into<String>) -> Self {
        Self::new(name, StateKind::Ordinary)
    }
}

/// Source side of a transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// Matches every non-terminal state.
    Any,
    /// Matches the listed states.
    States(Vec<String>),
}

impl Source {
    pub fn state(name: impl Into<String>) -> Self {
        Source::States(vec![name.into()])
    }

    pub fn matches(&self, state: &str) -> bool {
        match self {
            Source::Any => true,
            Source::States(states) => states.iter().any(|s| s == state),
        }
    }
}

impl Serialize for Source {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Source::Any => serializer.serialize_str(WILDCARD),
            Source::States(states) if states.len() == 1 => serializer.serialize_str(&states[0]),
            Source::States(states) => states.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Source {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};
        use std::fmt;

        struct SourceVisitor;

        impl<'de> Visitor<'de> for SourceVisitor {
            type Value = Source;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("'*', a state name, or an array of state names")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if v == WILDCARD {
                    Ok(Source::Any)
                } else {
                    Ok(Source::state(v))
                }
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut states = Vec::new();
                while let Some(s) = seq.next_element::<String>()? {
                    states.push(s);
                }
                Ok(Source::States(states))
            }
        }

        deserializer.deserialize_any(SourceVisitor)
    }
}

/// A transition in the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    pub trigger: String,
    pub source: Source,
    pub dest: String,
}

impl Transition {
    pub fn new(
        trigger: impl Into<String>,
        source: impl Into<String>,
        dest: impl Into<String>,
    ) -> Self {
        Self {
            trigger: trigger.into(),
            source: Source::state(source),
            dest: dest.into(),
        }
    }

    /// A transition from any non-terminal state.
    pub fn from_any(trigger: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            source: Source::Any,
            dest: dest.into(),
        }
    }

    /// A transition shared by several source states.
    pub fn from_states<I, S>(
        trigger: impl Into<String>,
        sources: I,
        dest: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trigger: trigger.into(),
            source: Source::States(sources.into_iter().map(Into::into).collect()),
            dest: dest.into(),
        }
    }
}

/// States and transitions with (state, trigger) resolution.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    /// States in registration order.
    states: Vec<StateDef>,
    kinds: HashMap<String, StateKind>,
    /// Transitions in registration order.
    transitions: Vec<Transition>,
    /// (state, trigger) -> index into `transitions`.
    concrete: HashMap<(String, String), usize>,
    /// trigger -> index into `transitions` for wildcard sources.
    wildcard: HashMap<String, usize>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds states and transitions as one batch.
    pub fn register<S, T>(&mut self, states: S, transitions: T) -> Result<(), CoreError>
    where
        S: IntoIterator<Item = StateDef>,
        T: IntoIterator<Item = Transition>,
    {
        let mut next = self.clone();
        for state in states {
            next.insert_state(state)?;
        }
        for transition in transitions {
            next.insert_transition(transition)?;
        }

        *self = next;
        Ok(())
    }

    /// Adds a single state.
    pub fn add_state(&mut self, state: StateDef) -> Result<(), CoreError> {
        self.register([state], Vec::<Transition>::new())
    }

    /// Adds a single transition.
    pub fn add_transition(&mut self, transition: Transition) -> Result<(), CoreError> {
        self.register(Vec::<StateDef>::new(), [transition])
    }

    fn insert_state(&mut self, state: StateDef) -> Result<(), CoreError> {
        if state.name.is_empty() {
            return Err(CoreError::configuration("state name must not be empty"));
        }
        if state.name == WILDCARD {
            return Err(CoreError::configuration(format!(
                "'{}' is reserved for wildcard sources",
                WILDCARD
            )));
        }

        if let Some(existing) = self.kinds.get(&state.name) {
            // Re-declaring a lifecycle state as ordinary keeps its role
            if *existing == state.kind || state.kind == StateKind::Ordinary {
                return Ok(());
            }
            return Err(CoreError::configuration(format!(
                "state '{}' is already registered as {:?}",
                state.name, existing
            )));
        }

        if state.kind != StateKind::Ordinary {
            if let Some(other) = self.states.iter().find(|s| s.kind == state.kind) {
                return Err(CoreError::configuration(format!(
                    "cannot register '{}' as {:?}: '{}' already has that role",
                    state.name, state.kind, other.name
                )));
            }
        }

        self.kinds.insert(state.name.clone(), state.kind);
        self.states.push(state);
        Ok(())
    }

    fn insert_transition(&mut self, transition: Transition) -> Result<(), CoreError> {
        if transition.trigger.is_empty() {
            return Err(CoreError::configuration("trigger name must not be empty"));
        }
        if !self.kinds.contains_key(&transition.dest) {
            return Err(CoreError::configuration(format!(
                "transition '{}' targets undefined state '{}'",
                transition.trigger, transition.dest
            )));
        }

        // Exact duplicates are harmless
        if self.transitions.contains(&transition) {
            return Ok(());
        }

        let index = self.transitions.len();
        match &transition.source {
            Source::Any => {
                let overlaps = self.wildcard.contains_key(&transition.trigger)
                    || self.concrete.keys().any(|(_, t)| *t == transition.trigger);
                if overlaps {
                    return Err(CoreError::configuration(format!(
                        "wildcard transition '{}' overlaps an existing transition with the same trigger",
                        transition.trigger
                    )));
                }
                self.wildcard.insert(transition.trigger.clone(), index);
            }
            Source::States(sources) => {
                if sources.is_empty() {
                    return Err(CoreError::configuration(format!(
                        "transition '{}' has no source state",
                        transition.trigger
                    )));
                }
                for source in sources {
                    if !self.kinds.contains_key(source) {
                        return Err(CoreError::configuration(format!(
                            "transition '{}' starts from undefined state '{}'",
                            transition.trigger, source
                        )));
                    }
                    let key = (source.clone(), transition.trigger.clone());
                    if self.concrete.contains_key(&key) || self.wildcard.contains_key(&key.1) {
                        return Err(CoreError::configuration(format!(
                            "ambiguous transition from '{}' on trigger '{}'",
                            source, transition.trigger
                        )));
                    }
                }
                for source in sources {
                    self.concrete
                        .insert((source.clone(), transition.trigger.clone()), index);
                }
            }
        }

        self.transitions.push(transition);
        Ok(())
    }

    /// Resolves the transition fired by `trigger` in `state`.
    ///
    /// Terminal and unknown states never resolve.
    pub fn resolve(&self, state: &str, trigger: &str) -> Option<&Transition> {
        match self.kinds.get(state) {
            Some(kind) if !kind.is_terminal() => {}
            _ => return None,
        }

        self.concrete
            .get(&(state.to_string(), trigger.to_string()))
            .or_else(|| self.wildcard.get(trigger))
            .map(|&i| &self.transitions[i])
    }

    /// Triggers whose source names `state` explicitly, in registration order.
    pub fn concrete_triggers(&self, state: &str) -> Vec<&str> {
        self.transitions
            .iter()
            .filter(|t| {
                matches!(&t.source, Source::States(names) if names.iter().any(|n| n == state))
            })
            .map(|t| t.trigger.as_str())
            .collect()
    }

    /// All triggers that resolve from `state`, wildcards included.
    pub fn triggers_from(&self, state: &str) -> Vec<&str> {
        if self.kind(state).map_or(true, StateKind::is_terminal) {
            return Vec::new();
        }
        self.transitions
            .iter()
            .filter(|t| t.source.matches(state))
            .map(|t| t.trigger.as_str())
            .collect()
    }

    pub fn has_state(&self, state: &str) -> bool {
        self.kinds.contains_key(state)
    }

    pub fn kind(&self, state: &str) -> Option<StateKind> {
        self.kinds.get(state).copied()
    }

    /// Name of the state holding a lifecycle role.
    pub fn state_with_kind(&self, kind: StateKind) -> Option<&str> {
        self.states
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.name.as_str())
    }

    pub fn states(&self) -> &[StateDef] {
        &self.states
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// CRC32C fingerprint of the canonical rulebook rendering.
    pub fn checksum(&self) -> String {
        let rendered = crate::rulebook::render(self);
        format!("{:08x}", crc32c::crc32c(rendered.as_bytes()))
    }

    /// Returns the table as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, CoreError> {
        Ok(serde_json::json!({
            "states": serde_json::to_value(&self.states)?,
            "transitions": serde_json::to_value(&self.transitions)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> TransitionTable {
        let mut table = TransitionTable::new();
        table
            .register(
                [
                    StateDef::new("INIT", StateKind::Init),
                    StateDef::new("ABORTED", StateKind::Aborted),
                    StateDef::new("DONE", StateKind::Done),
                    StateDef::ordinary("CHECK"),
                    StateDef::ordinary("SEARCH"),
                ],
                [
                    Transition::new("start", "INIT", "CHECK"),
                    Transition::new("found", "CHECK", "DONE"),
                    Transition::new("not_found", "CHECK", "SEARCH"),
                    Transition::new("search", "SEARCH", "CHECK"),
                    Transition::from_any("end", "DONE"),
                ],
            )
            .unwrap();
        table
    }

    #[test]
    fn test_resolve() {
        let table = sample_table();

        assert_eq!(table.resolve("INIT", "start").unwrap().dest, "CHECK");
        assert_eq!(table.resolve("CHECK", "not_found").unwrap().dest, "SEARCH");
        assert!(table.resolve("INIT", "found").is_none());
        assert!(table.resolve("NOPE", "start").is_none());
    }

    #[test]
    fn test_wildcard_resolution() {
        let table = sample_table();

        assert_eq!(table.resolve("SEARCH", "end").unwrap().dest, "DONE");
        assert_eq!(table.resolve("INIT", "end").unwrap().dest, "DONE");
        // Terminal states resolve nothing, wildcard included
        assert!(table.resolve("DONE", "end").is_none());
        assert!(table.resolve("ABORTED", "end").is_none());
    }

    #[test]
    fn test_undefined_states_rejected() {
        let mut table = sample_table();

        let result = table.add_transition(Transition::new("go", "CHECK", "MISSING"));
        assert!(matches!(result, Err(CoreError::Configuration { .. })));

        let result = table.add_transition(Transition::new("go", "MISSING", "CHECK"));
        assert!(matches!(result, Err(CoreError::Configuration { .. })));
    }

    #[test]
    fn test_ambiguity_rejected() {
        let mut table = sample_table();

        let result = table.add_transition(Transition::new("found", "CHECK", "SEARCH"));
        assert!(matches!(result, Err(CoreError::Configuration { .. })));

        // A concrete transition on a wildcard trigger overlaps the wildcard
        let result = table.add_transition(Transition::new("end", "CHECK", "SEARCH"));
        assert!(matches!(result, Err(CoreError::Configuration { .. })));

        let result = table.add_transition(Transition::from_any("search", "DONE"));
        assert!(matches!(result, Err(CoreError::Configuration { .. })));
    }

    #[test]
    fn test_exact_duplicate_is_noop() {
        let mut table = sample_table();
        let before = table.transitions().len();

        table
            .add_transition(Transition::new("found", "CHECK", "DONE"))
            .unwrap();
        assert_eq!(table.transitions().len(), before);
    }

    #[test]
    fn test_register_is_atomic() {
        let mut table = sample_table();
        let result = table.register(
            [StateDef::ordinary("EXTRA")],
            [
                Transition::new("extra", "CHECK", "EXTRA"),
                Transition::new("broken", "EXTRA", "MISSING"),
            ],
        );

        assert!(result.is_err());
        assert!(!table.has_state("EXTRA"));
        assert!(table.resolve("CHECK", "extra").is_none());
    }

    #[test]
    fn test_lifecycle_roles_are_unique() {
        let mut table = sample_table();

        let result = table.add_state(StateDef::new("OTHER_DONE", StateKind::Done));
        assert!(matches!(result, Err(CoreError::Configuration { .. })));

        // Ordinary re-declaration of a lifecycle state keeps the role
        table.add_state(StateDef::ordinary("DONE")).unwrap();
        assert_eq!(table.kind("DONE"), Some(StateKind::Done));

        let result = table.add_state(StateDef::new("CHECK", StateKind::Aborted));
        assert!(result.is_err());
    }

    #[test]
    fn test_multi_source_transition() {
        let mut table = sample_table();
        table
            .add_transition(Transition::from_states(
                "retry",
                ["CHECK", "SEARCH"],
                "INIT",
            ))
            .unwrap();

        assert_eq!(table.resolve("CHECK", "retry").unwrap().dest, "INIT");
        assert_eq!(table.resolve("SEARCH", "retry").unwrap().dest, "INIT");
    }

    #[test]
    fn test_trigger_listing() {
        let table = sample_table();

        assert_eq!(table.concrete_triggers("CHECK"), vec!["found", "not_found"]);
        assert_eq!(table.triggers_from("CHECK"), vec!["found", "not_found", "end"]);
        assert!(table.triggers_from("DONE").is_empty());
        assert_eq!(table.state_with_kind(StateKind::Init), Some("INIT"));
    }

    #[test]
    fn test_source_serde() {
        let t: Transition =
            serde_json::from_str(r#"{"trigger": "go", "source": "*", "dest": "DONE"}"#).unwrap();
        assert_eq!(t.source, Source::Any);

        let t: Transition =
            serde_json::from_str(r#"{"trigger": "go", "source": ["A", "B"], "dest": "C"}"#)
                .unwrap();
        assert_eq!(t.source, Source::States(vec!["A".into(), "B".into()]));

        let json = serde_json::to_value(Transition::new("go", "A", "B")).unwrap();
        assert_eq!(json["source"], "A");
    }

    #[test]
    fn test_checksum_tracks_content() {
        let a = sample_table();
        let b = sample_table();
        assert_eq!(a.checksum(), b.checksum());

        let mut c = sample_table();
        c.add_state(StateDef::ordinary("EXTRA")).unwrap();
        assert_ne!(a.checksum(), c.checksum());
    }
}
