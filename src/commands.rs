//! Command implementations.

use crate::config::Config;
use crate::Commands;
use colored::Colorize;
use missionfsm_core::{
    Lifecycle, Rulebook, RulebookLoader, Source, StateKind, StateMachineEngine, WILDCARD,
};
use missionfsm_mission::{
    visibility_script, MissionAssembler, ReachMission, RecordingActuator, ScriptedPerception,
};
use std::path::Path;
use std::sync::Arc;

pub fn execute(config: &Config, cmd: Commands) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Check {
            rulebook,
            name,
            plain,
        } => {
            let engine = load_engine(config, &rulebook, name, plain)?;
            engine.validate()?;

            let table = engine.table();
            let mut output = format!(
                "{} {} ({} states, {} transitions, checksum {})\n",
                "Valid".green(),
                engine.name().cyan(),
                table.states().len(),
                table.transitions().len(),
                table.checksum()
            );

            output.push_str(&format!("{}\n", "States:".bold()));
            for state in table.states() {
                let role = match state.kind {
                    StateKind::Init => "init".yellow(),
                    StateKind::Done => "done".green(),
                    StateKind::Aborted => "aborted".red(),
                    StateKind::Ordinary => "".normal(),
                };
                output.push_str(&format!("  {} {}\n", state.name, role));
            }

            output.push_str(&format!("{}\n", "Transitions:".bold()));
            for transition in table.transitions() {
                output.push_str(&format!(
                    "  {}: {} -> {}\n",
                    transition.trigger.cyan(),
                    source_label(&transition.source),
                    transition.dest
                ));
            }

            Ok(output.trim_end().to_string())
        }

        Commands::Export { rulebook } => {
            let loader = RulebookLoader::new(config.rulebook.unknown_lines);
            let parsed = loader.load_path(&rulebook)?;
            Ok(parsed.render().trim_end().to_string())
        }

        Commands::Diagram {
            rulebook,
            name,
            plain,
            out,
        } => {
            let engine = load_engine(config, &rulebook, name, plain)?;
            let dir = out.unwrap_or_else(|| config.diagram.output_dir.clone());
            std::fs::create_dir_all(&dir)?;
            let path = engine.describe(&dir)?;
            Ok(format!("{} {}", "Wrote".green(), path.display()))
        }

        Commands::Simulate {
            name,
            camera,
            target,
            visible_after,
            arrive_after,
            avoid,
            realtime,
        } => {
            let mut params = config.reach.clone();
            if !realtime {
                params.settle_ms = 0;
                params.arrival_delay_ms = 0;
            }

            let mut perception = ScriptedPerception::new()
                .with_visibility(&target, visibility_script(visible_after, arrive_after));
            // Each obstacle is seen on the first check only
            for obstacle in &avoid {
                perception = perception.with_visibility(obstacle, [true, false]);
            }
            let actuator = Arc::new(RecordingActuator::new());

            let mission = ReachMission::new(
                camera.as_str(),
                target.as_str(),
                Arc::new(perception),
                actuator.clone(),
            )
            .with_params(params)
            .with_avoid(avoid);

            let mut engine = MissionAssembler::new(name)
                .verbose(config.engine.verbose)
                .build(&mission)?;
            let outcome = engine.run()?;

            let label = if outcome.is_success() {
                "DONE".green()
            } else {
                "ABORTED".red()
            };
            Ok(format!(
                "{} {} ({}) after {} steps: {} marches, {} rotations",
                "Result".bold(),
                label,
                outcome.code(),
                engine.step_count(),
                actuator.marches().len(),
                actuator.rotations().len()
            ))
        }

        Commands::Config => Ok(config.to_yaml()?.trim_end().to_string()),
    }
}

fn load_engine(
    config: &Config,
    path: &Path,
    name: Option<String>,
    plain: bool,
) -> Result<StateMachineEngine, Box<dyn std::error::Error>> {
    let name = match name {
        Some(name) => name,
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| format!("cannot derive a machine name from '{}'", path.display()))?,
    };

    let rulebook: Rulebook = RulebookLoader::new(config.rulebook.unknown_lines).load_path(path)?;
    let lifecycle = if plain {
        Lifecycle::new("INIT", "ABORTED", "DONE", "start", "end", "abort")
    } else {
        Lifecycle::for_machine(&name)
    };

    let mut engine = StateMachineEngine::from_rulebook(name, lifecycle, &rulebook)?;
    engine.set_verbose(config.engine.verbose);
    Ok(engine)
}

fn source_label(source: &Source) -> String {
    match source {
        Source::Any => WILDCARD.to_string(),
        Source::States(states) if states.len() == 1 => states[0].clone(),
        Source::States(states) => format!("[{}]", states.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const RULES: &str = "\
('SEARCH', 'CHECK')
{'trigger': 'start', 'source': 'INIT', 'dest': 'SEARCH'}
{'trigger': 'look', 'source': 'SEARCH', 'dest': 'CHECK'}
{'trigger': 'found', 'source': 'CHECK', 'dest': 'DONE'}
";

    fn plain_output() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_check_lists_table() {
        plain_output();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.rules");
        fs::write(&path, RULES).unwrap();

        let output = execute(
            &Config::default(),
            Commands::Check {
                rulebook: path,
                name: None,
                plain: true,
            },
        )
        .unwrap();

        assert!(output.starts_with("Valid search (5 states, 5 transitions"));
        assert!(output.contains("  look: SEARCH -> CHECK"));
        assert!(output.contains("  abort: * -> ABORTED"));
    }

    #[test]
    fn test_check_reports_invalid_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.rules");
        // CHECK has no way out
        fs::write(
            &path,
            "('SEARCH', 'CHECK')\n\
             {'trigger': 'look', 'source': 'SEARCH', 'dest': 'CHECK'}\n\
             {'trigger': 'start', 'source': 'INIT', 'dest': 'SEARCH'}\n",
        )
        .unwrap();

        let result = execute(
            &Config::default(),
            Commands::Check {
                rulebook: path,
                name: None,
                plain: true,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_diagram_written_to_out_dir() {
        plain_output();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.rules");
        fs::write(&path, RULES).unwrap();
        let out = dir.path().join("diagrams");

        let output = execute(
            &Config::default(),
            Commands::Diagram {
                rulebook: path,
                name: Some("gate".to_string()),
                plain: true,
                out: Some(out.clone()),
            },
        )
        .unwrap();

        assert!(output.starts_with("Wrote"));
        assert!(out.join("gate_machine_diagram.dot").exists());
    }

    #[test]
    fn test_simulate_reports_result_code() {
        plain_output();
        let output = execute(
            &Config::default(),
            Commands::Simulate {
                name: "gate".to_string(),
                camera: "front".to_string(),
                target: "gate".to_string(),
                visible_after: 2,
                arrive_after: 1,
                avoid: Vec::new(),
                realtime: false,
            },
        )
        .unwrap();

        assert!(output.starts_with("Result DONE (1) after 9 steps"));
        assert!(output.contains("1 marches, 2 rotations"));
    }
}
