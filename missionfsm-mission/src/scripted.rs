//! Deterministic collaborators for simulation and tests.
//!
//! [`ScriptedPerception`] answers visibility and bearing queries from
//! per-target scripts. When a script runs out, its last answer repeats
//! (visibility defaults to not seen, bearings to dead ahead).
//! [`RecordingActuator`] accepts every command and records it.

use crate::collaborators::{Actuator, EventSpec, Motion, Perception, PerceptionEvent, Rotation};
use missionfsm_core::CallbackError;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Script<T> {
    pending: VecDeque<T>,
    last: Option<T>,
    served: usize,
}

impl<T: Clone> Script<T> {
    fn next(&mut self) -> Option<T> {
        if let Some(value) = self.pending.pop_front() {
            self.last = Some(value);
        }
        self.served += 1;
        self.last.clone()
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    visibility: HashMap<String, Script<bool>>,
    bearings: HashMap<String, Script<Option<f64>>>,
    specs: Vec<EventSpec>,
    listening: usize,
}

/// Perception answering from scripts.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPerception {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedPerception {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues visibility answers for `target`.
    pub fn with_visibility(
        self,
        target: impl Into<String>,
        script: impl IntoIterator<Item = bool>,
    ) -> Self {
        self.state
            .lock()
            .visibility
            .entry(target.into())
            .or_default()
            .pending
            .extend(script);
        self
    }

    /// Queues bearing answers for `target`; `None` means out of view.
    pub fn with_bearings(
        self,
        target: impl Into<String>,
        script: impl IntoIterator<Item = Option<f64>>,
    ) -> Self {
        self.state
            .lock()
            .bearings
            .entry(target.into())
            .or_default()
            .pending
            .extend(script);
        self
    }

    /// Number of visibility answers served for `target`.
    pub fn polls(&self, target: &str) -> usize {
        self.state
            .lock()
            .visibility
            .get(target)
            .map_or(0, |s| s.served)
    }

    /// Number of bearing answers served for `target`.
    pub fn bearing_queries(&self, target: &str) -> usize {
        self.state.lock().bearings.get(target).map_or(0, |s| s.served)
    }

    /// Specs of every event created so far.
    pub fn specs(&self) -> Vec<EventSpec> {
        self.state.lock().specs.clone()
    }

    /// Events currently listening.
    pub fn listening(&self) -> usize {
        self.state.lock().listening
    }
}

impl Perception for ScriptedPerception {
    fn event(&self, spec: &EventSpec) -> Result<Box<dyn PerceptionEvent>, CallbackError> {
        self.state.lock().specs.push(spec.clone());
        Ok(Box::new(ScriptedEvent {
            target: spec.target.clone(),
            state: self.state.clone(),
            listening: false,
        }))
    }

    fn bearing(&self, _camera: &str, target: &str) -> Result<Option<f64>, CallbackError> {
        let mut state = self.state.lock();
        let script = state.bearings.entry(target.to_string()).or_default();
        Ok(script.next().unwrap_or(Some(0.0)))
    }
}

struct ScriptedEvent {
    target: String,
    state: Arc<Mutex<ScriptState>>,
    listening: bool,
}

impl PerceptionEvent for ScriptedEvent {
    fn start_listening(&mut self) -> Result<(), CallbackError> {
        if !self.listening {
            self.listening = true;
            self.state.lock().listening += 1;
        }
        Ok(())
    }

    fn stop_listening(&mut self) -> Result<(), CallbackError> {
        if self.listening {
            self.listening = false;
            self.state.lock().listening -= 1;
        }
        Ok(())
    }

    fn is_triggered(&mut self) -> Result<bool, CallbackError> {
        if !self.listening {
            return Err(CallbackError::new(format!(
                "event for '{}' queried while not listening",
                self.target
            )));
        }
        let mut state = self.state.lock();
        let script = state.visibility.entry(self.target.clone()).or_default();
        Ok(script.next().unwrap_or(false))
    }
}

/// Visibility answers for a reach run: the target is missed `visible_after`
/// times, then each approach sees it, marches, and checks arrival. The
/// target drops out of view (arrival) on approach number `arrive_after`.
pub fn visibility_script(visible_after: usize, arrive_after: usize) -> Vec<bool> {
    let mut script = vec![false; visible_after];
    for approach in 1..=arrive_after.max(1) {
        script.push(true);
        script.push(approach < arrive_after);
    }
    script
}

/// A command received by [`RecordingActuator`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    March(Motion),
    Rotate(Rotation),
    Detection { camera: String, enabled: bool },
}

/// Actuator that records every command.
#[derive(Debug, Default)]
pub struct RecordingActuator {
    commands: Mutex<Vec<Command>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().clone()
    }

    pub fn marches(&self) -> Vec<Motion> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                Command::March(m) => Some(*m),
                _ => None,
            })
            .collect()
    }

    pub fn rotations(&self) -> Vec<Rotation> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                Command::Rotate(r) => Some(*r),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }
}

impl Actuator for RecordingActuator {
    fn march(&self, motion: Motion) -> Result<(), CallbackError> {
        tracing::debug!(?motion, "march");
        self.commands.lock().push(Command::March(motion));
        Ok(())
    }

    fn rotate(&self, rotation: Rotation) -> Result<(), CallbackError> {
        tracing::debug!(?rotation, "rotate");
        self.commands.lock().push(Command::Rotate(rotation));
        Ok(())
    }

    fn enable_detection(&self, camera: &str, enabled: bool) -> Result<(), CallbackError> {
        tracing::debug!(camera, enabled, "detection");
        self.commands.lock().push(Command::Detection {
            camera: camera.to_string(),
            enabled,
        });
        Ok(())
    }
}
