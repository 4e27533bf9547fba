//! Graphviz rendering of a transition table.
//!
//! Diagrams are derived from the live table on every call, so they always
//! match the table at the moment of the query.

use crate::table::{Source, StateKind, TransitionTable, WILDCARD};
use std::fmt::Write as _;

/// Renders `table` as a DOT digraph, highlighting `current` if given.
pub fn to_dot(name: &str, table: &TransitionTable, current: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph {} {{", quote(name));
    out.push_str("    rankdir=LR;\n");
    out.push_str("    node [shape=box, style=rounded];\n");

    for state in table.states() {
        let mut attrs = vec![format!("label={}", quote(&state.name))];
        match state.kind {
            StateKind::Init => attrs.push("shape=oval".to_string()),
            StateKind::Done => attrs.push("shape=doublecircle".to_string()),
            StateKind::Aborted => attrs.push("shape=doubleoctagon".to_string()),
            StateKind::Ordinary => {}
        }
        if current == Some(state.name.as_str()) {
            attrs.push("style=\"rounded,filled\"".to_string());
            attrs.push("fillcolor=lightblue".to_string());
        }
        let _ = writeln!(out, "    {} [{}];", quote(&state.name), attrs.join(", "));
    }

    let has_wildcard = table
        .transitions()
        .iter()
        .any(|t| t.source == Source::Any);
    if has_wildcard {
        let _ = writeln!(out, "    {} [shape=point, label=\"\"];", quote(WILDCARD));
    }

    for transition in table.transitions() {
        let label = quote(&transition.trigger);
        let dest = quote(&transition.dest);
        match &transition.source {
            Source::Any => {
                let _ = writeln!(
                    out,
                    "    {} -> {} [label={}, style=dashed];",
                    quote(WILDCARD),
                    dest,
                    label
                );
            }
            Source::States(sources) => {
                for source in sources {
                    let _ = writeln!(out, "    {} -> {} [label={}];", quote(source), dest, label);
                }
            }
        }
    }

    out.push_str("}\n");
    out
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{StateDef, Transition};

    #[test]
    fn test_dot_follows_table() {
        let mut table = TransitionTable::new();
        table
            .register(
                [
                    StateDef::new("INIT", StateKind::Init),
                    StateDef::new("DONE", StateKind::Done),
                    StateDef::ordinary("CHECK"),
                ],
                [
                    Transition::new("start", "INIT", "CHECK"),
                    Transition::new("found", "CHECK", "DONE"),
                    Transition::from_any("end", "DONE"),
                ],
            )
            .unwrap();

        let dot = to_dot("reach", &table, Some("CHECK"));
        assert!(dot.starts_with("digraph \"reach\" {"));
        assert!(dot.contains("\"INIT\" -> \"CHECK\" [label=\"start\"];"));
        assert!(dot.contains("\"*\" -> \"DONE\" [label=\"end\", style=dashed];"));
        assert!(dot.contains("fillcolor=lightblue"));

        table
            .add_transition(Transition::new("again", "CHECK", "INIT"))
            .unwrap();
        let dot = to_dot("reach", &table, None);
        assert!(dot.contains("\"CHECK\" -> \"INIT\" [label=\"again\"];"));
        assert!(!dot.contains("fillcolor"));
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote("say \"hi\""), "\"say \\\"hi\\\"\"");
    }
}
