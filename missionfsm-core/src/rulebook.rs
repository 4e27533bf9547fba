//! Rulebook loading and rendering.
//!
//! A rulebook is a UTF-8 text file with one record per line:
//!
//! ```text
//! # reach mission
//! ('SEARCH', 'CHECK')
//! {'trigger': 'look', 'source': 'SEARCH', 'dest': 'CHECK'}
//! {'trigger': 'retry', 'source': ['CHECK', 'SEARCH'], 'dest': 'SEARCH'}
//! {'trigger': 'give_up', 'source': '*', 'dest': 'ABORTED'}
//! ```
//!
//! Lines opening with `(` or `[` list state names; lines opening with `{`
//! hold one transition. Every line goes through the literal parser in
//! [`crate::literal`], so a rulebook can never run code. The loader does no
//! semantic checks: state and transition consistency is enforced when the
//! rulebook is registered into a table.

use crate::error::CoreError;
use crate::literal::Literal;
use crate::table::{Source, StateDef, Transition, TransitionTable, WILDCARD};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// What to do with a line whose first character opens no known record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownLinePolicy {
    /// Log a warning and ignore the line.
    #[default]
    Skip,
    /// Fail with a parse error.
    Reject,
}

/// Parsed rulebook content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rulebook {
    /// State names in first-seen order.
    pub states: Vec<String>,
    /// Transitions in file order.
    pub transitions: Vec<Transition>,
}

impl Rulebook {
    /// Parses rulebook text, skipping unknown lines.
    pub fn parse_str(input: &str) -> Result<Self, CoreError> {
        RulebookLoader::default().parse_str(input)
    }

    /// Reads and parses a rulebook file, skipping unknown lines.
    pub fn load_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        RulebookLoader::default().load_path(path)
    }

    /// Extracts the states and transitions of a table.
    pub fn from_table(table: &TransitionTable) -> Self {
        Self {
            states: table.states().iter().map(|s| s.name.clone()).collect(),
            transitions: table.transitions().to_vec(),
        }
    }

    /// Builds a table holding the rulebook content as ordinary states.
    pub fn to_table(&self) -> Result<TransitionTable, CoreError> {
        let mut table = TransitionTable::new();
        table.register(
            self.states.iter().map(StateDef::ordinary),
            self.transitions.iter().cloned(),
        )?;
        Ok(table)
    }

    /// Renders the rulebook in the format read by [`Rulebook::parse_str`].
    pub fn render(&self) -> String {
        let mut out = String::new();

        if !self.states.is_empty() {
            let states = self.states.iter().map(|s| Literal::from(s.as_str()));
            let states = Literal::Tuple(states.collect());
            let _ = writeln!(out, "{}", states);
        }

        for transition in &self.transitions {
            let source = match &transition.source {
                Source::Any => Literal::from(WILDCARD),
                Source::States(names) if names.len() == 1 => Literal::from(names[0].as_str()),
                Source::States(names) => {
                    Literal::List(names.iter().map(|n| Literal::from(n.as_str())).collect())
                }
            };
            let record = Literal::Dict(vec![
                ("trigger".to_string(), Literal::from(transition.trigger.as_str())),
                ("source".to_string(), source),
                ("dest".to_string(), Literal::from(transition.dest.as_str())),
            ]);
            let _ = writeln!(out, "{}", record);
        }

        out
    }
}

/// Renders a table as rulebook text.
pub fn render(table: &TransitionTable) -> String {
    Rulebook::from_table(table).render()
}

/// Line-oriented rulebook parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulebookLoader {
    policy: UnknownLinePolicy,
}

impl RulebookLoader {
    pub fn new(policy: UnknownLinePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> UnknownLinePolicy {
        self.policy
    }

    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<Rulebook, CoreError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)?;
        let rulebook = self.parse_str(&input)?;
        tracing::debug!(
            path = %path.display(),
            states = rulebook.states.len(),
            transitions = rulebook.transitions.len(),
            "rulebook loaded"
        );
        Ok(rulebook)
    }

    pub fn parse_str(&self, input: &str) -> Result<Rulebook, CoreError> {
        let mut rulebook = Rulebook::default();

        for (index, raw) in input.lines().enumerate() {
            let line = index + 1;
            let text = raw.trim();

            match text.chars().next() {
                None | Some('#') => continue,
                Some('(') | Some('[') => {
                    for name in parse_state_line(text, line)? {
                        if !rulebook.states.contains(&name) {
                            rulebook.states.push(name);
                        }
                    }
                }
                Some('{') => rulebook.transitions.push(parse_transition_line(text, line)?),
                Some(other) => match self.policy {
                    UnknownLinePolicy::Skip => {
                        tracing::warn!(line, leading = %other, "skipping unrecognized rulebook line");
                    }
                    UnknownLinePolicy::Reject => {
                        return Err(CoreError::RulebookParse {
                            line,
                            reason: format!("unrecognized line start '{}'", other),
                        });
                    }
                },
            }
        }

        Ok(rulebook)
    }
}

fn parse_state_line(text: &str, line: usize) -> Result<Vec<String>, CoreError> {
    let literal = Literal::parse_at(text, line)?;
    let items = literal.as_sequence().ok_or_else(|| CoreError::RulebookParse {
        line,
        reason: format!("expected a tuple of state names, got {}", literal.kind()),
    })?;

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| CoreError::RulebookParse {
                    line,
                    reason: format!("state names must be strings, got {}", item.kind()),
                })
        })
        .collect()
}

fn parse_transition_line(text: &str, line: usize) -> Result<Transition, CoreError> {
    let literal = Literal::parse_at(text, line)?;
    let entries = literal.as_dict().ok_or_else(|| CoreError::RulebookParse {
        line,
        reason: format!("expected a transition dict, got {}", literal.kind()),
    })?;

    let bad = |reason: String| CoreError::RulebookParse { line, reason };

    let mut trigger = None;
    let mut source = None;
    let mut dest = None;
    for (key, value) in entries {
        match key.as_str() {
            "trigger" => trigger = Some(value),
            "source" => source = Some(value),
            "dest" => dest = Some(value),
            other => return Err(bad(format!("unknown transition key '{}'", other))),
        }
    }

    let name = |field: &str, value: Option<&Literal>| -> Result<String, CoreError> {
        match value {
            Some(Literal::Str(s)) => Ok(s.clone()),
            Some(other) => Err(bad(format!("'{}' must be a string, got {}", field, other.kind()))),
            None => Err(bad(format!("missing '{}'", field))),
        }
    };

    let trigger = name("trigger", trigger)?;
    let dest = name("dest", dest)?;
    let source = match source {
        Some(Literal::Str(s)) if s == WILDCARD => Source::Any,
        Some(Literal::Str(s)) => Source::state(s.as_str()),
        Some(Literal::Tuple(items)) | Some(Literal::List(items)) => Source::States(
            items
                .iter()
                .map(|item| name("source", Some(item)))
                .collect::<Result<_, _>>()?,
        ),
        Some(other) => {
            return Err(bad(format!(
                "'source' must be a state name, '*' or a list of names, got {}",
                other.kind()
            )))
        }
        None => return Err(bad("missing 'source'".to_string())),
    };

    Ok(Transition {
        trigger,
        source,
        dest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_rulebook() {
        let input = "('A_INIT', 'A_ABORTED', 'A_DONE')\n\
                     {'trigger': 'a_start', 'source': 'A_INIT', 'dest': 'A_DONE'}\n";
        let rulebook = Rulebook::parse_str(input).unwrap();

        assert_eq!(rulebook.states, vec!["A_INIT", "A_ABORTED", "A_DONE"]);
        assert_eq!(
            rulebook.transitions,
            vec![Transition::new("a_start", "A_INIT", "A_DONE")]
        );

        let table = rulebook.to_table().unwrap();
        assert_eq!(table.states().len(), 3);
        assert_eq!(table.transitions().len(), 1);
    }

    #[test]
    fn test_comments_blank_lines_and_repeated_states() {
        let input = r#"
# states
("A", "B")

["B", "C",]
{"trigger": "go", "source": ["A", "B"], "dest": "C"}
{"trigger": "quit", "source": "*", "dest": "C"}
"#;
        let rulebook = Rulebook::parse_str(input).unwrap();
        assert_eq!(rulebook.states, vec!["A", "B", "C"]);
        assert_eq!(
            rulebook.transitions[0].source,
            Source::States(vec!["A".into(), "B".into()])
        );
        assert_eq!(rulebook.transitions[1].source, Source::Any);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let input = "('A', 'B')\n{'trigger': 'go', 'source': 'A', 'dest': 'B'\n";
        let err = Rulebook::parse_str(input).unwrap_err();
        assert!(matches!(err, CoreError::RulebookParse { line: 2, .. }));
    }

    #[test]
    fn test_deeply_nested_line_is_a_parse_error() {
        let deep = format!("{}'A'{}", "(".repeat(20_000), ",)".repeat(20_000));
        let input = format!("# generated\n('A', 'B')\n{}\n", deep);
        let err = Rulebook::parse_str(&input).unwrap_err();
        assert!(matches!(err, CoreError::RulebookParse { line: 3, .. }));
    }

    #[test]
    fn test_code_is_never_evaluated() {
        let input = "('A',)\n{'trigger': __import__('os').system('true'), 'source': 'A', 'dest': 'A'}\n";
        let err = Rulebook::parse_str(input).unwrap_err();
        assert!(matches!(err, CoreError::RulebookParse { line: 2, .. }));
    }

    #[test]
    fn test_transition_record_shape() {
        let cases = [
            "{'trigger': 'go', 'source': 'A'}",
            "{'trigger': 'go', 'source': 'A', 'dest': 'B', 'guard': 'x'}",
            "{'trigger': 1, 'source': 'A', 'dest': 'B'}",
            "{'trigger': 'go', 'source': 3, 'dest': 'B'}",
            "{'trigger': 'go', 'source': ['A', 2], 'dest': 'B'}",
        ];
        for case in cases {
            let result = Rulebook::parse_str(case);
            assert!(
                matches!(result, Err(CoreError::RulebookParse { line: 1, .. })),
                "accepted {case}"
            );
        }
    }

    #[test]
    fn test_unknown_line_policy() {
        let input = "('A',)\nstates = A\n";

        let rulebook = Rulebook::parse_str(input).unwrap();
        assert_eq!(rulebook.states, vec!["A"]);

        let loader = RulebookLoader::new(UnknownLinePolicy::Reject);
        let err = loader.parse_str(input).unwrap_err();
        assert!(matches!(err, CoreError::RulebookParse { line: 2, .. }));
    }

    #[test]
    fn test_no_semantic_validation_in_loader() {
        let input = "{'trigger': 'go', 'source': 'NOWHERE', 'dest': 'ELSEWHERE'}\n";
        let rulebook = Rulebook::parse_str(input).unwrap();
        assert_eq!(rulebook.transitions.len(), 1);

        assert!(matches!(
            rulebook.to_table(),
            Err(CoreError::Configuration { .. })
        ));
    }

    #[test]
    fn test_render_reads_back() {
        let rulebook = Rulebook {
            states: vec!["A".into(), "it's".into(), "C".into()],
            transitions: vec![
                Transition::new("go", "A", "it's"),
                Transition::from_states("back", ["it's", "C"], "A"),
                Transition::from_any("stop", "C"),
            ],
        };

        let rendered = rulebook.render();
        assert!(rendered.starts_with("('A', 'it\\'s', 'C')\n"));
        assert!(rendered.contains("{'trigger': 'stop', 'source': '*', 'dest': 'C'}"));
        assert_eq!(Rulebook::parse_str(&rendered).unwrap(), rulebook);
    }

    #[test]
    fn test_load_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mission.rules");
        std::fs::write(
            &path,
            "('A', 'B')\n{'trigger': 'go', 'source': 'A', 'dest': 'B'}\n",
        )
        .unwrap();

        let rulebook = Rulebook::load_path(&path).unwrap();
        assert_eq!(rulebook.states.len(), 2);

        let missing = Rulebook::load_path(dir.path().join("missing.rules"));
        assert!(matches!(missing, Err(CoreError::Io(_))));
    }
}
