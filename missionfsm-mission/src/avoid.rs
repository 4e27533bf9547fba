//! Avoidance mission: side-step while any listed obstacle is close.
//!
//! `INIT -> condition_obstacle`, which leads to `move_lag` (and back) while an
//! obstacle is seen and to DONE once the way is clear. Running out of lag
//! moves escalates to ABORTED.

use crate::assembler::{Fragment, MissionTemplate, Namespace};
use crate::collaborators::{
    march_action, poll, share_event, Actuator, Confirmation, EventSpec, Motion, Perception, Side,
};
use crate::error::MissionError;
use missionfsm_core::{CallbackError, FireContext, Lifecycle, Literal, OutcomeMap, Scene};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Avoidance tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidParams {
    /// Side to lag towards.
    pub lag: Side,
    pub velocity: f64,
    pub duration_ms: u64,
    /// Lag moves allowed per run.
    pub max_lags: u32,
}

impl Default for AvoidParams {
    fn default() -> Self {
        Self {
            lag: Side::Left,
            velocity: 0.4,
            duration_ms: 1000,
            max_lags: 5,
        }
    }
}

impl AvoidParams {
    pub fn validate(&self) -> Result<(), MissionError> {
        if !(self.velocity.is_finite() && self.velocity > 0.0) {
            return Err(MissionError::invalid("lag velocity", "must be positive"));
        }
        if self.max_lags == 0 {
            return Err(MissionError::invalid("max_lags", "must be at least 1"));
        }
        Ok(())
    }

    pub fn motion(&self) -> Motion {
        Motion {
            direction: self.lag.direction(),
            velocity: self.velocity,
            duration_ms: self.duration_ms,
        }
    }
}

/// Lags sideways until none of `obstacles` is seen.
pub struct AvoidMission {
    camera: String,
    obstacles: Vec<String>,
    params: AvoidParams,
    settle: Duration,
    confirmation: Confirmation,
    perception: Arc<dyn Perception>,
    actuator: Arc<dyn Actuator>,
}

impl AvoidMission {
    pub fn new(
        camera: impl Into<String>,
        obstacles: Vec<String>,
        params: AvoidParams,
        perception: Arc<dyn Perception>,
        actuator: Arc<dyn Actuator>,
    ) -> Self {
        Self {
            camera: camera.into(),
            obstacles,
            params,
            settle: Duration::ZERO,
            confirmation: Confirmation::Count(1),
            perception,
            actuator,
        }
    }

    /// Listening time per obstacle check.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_confirmation(mut self, confirmation: Confirmation) -> Self {
        self.confirmation = confirmation;
        self
    }
}

impl MissionTemplate for AvoidMission {
    fn kind(&self) -> &'static str {
        "avoid"
    }

    fn fragment(&self, ns: &Namespace, lc: &Lifecycle) -> Result<Fragment, MissionError> {
        self.params.validate()?;
        if self.obstacles.is_empty() {
            return Err(MissionError::invalid("obstacles", "at least one obstacle is required"));
        }

        let obstacle = ns.qualify("condition_obstacle");
        let lag = ns.qualify("move_lag");
        let succeeded = ns.qualify("condition_s");
        let failed = ns.qualify("condition_f");
        let lagged = ns.qualify("lagged");

        let events = self
            .obstacles
            .iter()
            .map(|name| {
                let spec = EventSpec::objects(&self.camera, name.as_str(), self.confirmation);
                self.perception.event(&spec).map(share_event)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let lags = Arc::new(Mutex::new(0u32));

        let condition = {
            let lags = lags.clone();
            let settle = self.settle;
            let max_lags = self.params.max_lags;
            move || -> Result<bool, CallbackError> {
                let mut seen = false;
                for event in &events {
                    seen |= poll(event, settle)?;
                }
                if !seen {
                    return Ok(false);
                }

                let mut lags = lags.lock();
                if *lags >= max_lags {
                    return Err(CallbackError::new(format!(
                        "obstacle still close after {} lag moves",
                        *lags
                    )));
                }
                *lags += 1;
                Ok(true)
            }
        };

        let reset = move |_: &FireContext<'_>, _: &[Literal]| -> Result<(), CallbackError> {
            *lags.lock() = 0;
            Ok(())
        };

        let mut fragment = Fragment::new(&obstacle);
        fragment
            .state(&obstacle)
            .state(&lag)
            .transition(&succeeded, &obstacle, &lag)
            .transition(&failed, &obstacle, &lc.done)
            .transition(&lagged, &lag, &obstacle)
            .scene(
                &obstacle,
                Scene::condition(
                    condition,
                    OutcomeMap::new(&succeeded, &failed).escalate_errors_to(&lc.abort),
                ),
            )
            .scene(
                &lag,
                Scene::action(march_action(self.actuator.clone()), self.params.motion().to_args()),
            );
        fragment.init_action = Some(Scene::action(reset, Vec::new()));

        Ok(fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::MissionAssembler;
    use crate::collaborators::Direction;
    use crate::scripted::{RecordingActuator, ScriptedPerception};
    use missionfsm_core::RunOutcome;

    fn build(
        perception: &ScriptedPerception,
        actuator: &Arc<RecordingActuator>,
        max_lags: u32,
    ) -> missionfsm_core::StateMachineEngine {
        let mission = AvoidMission::new(
            "front",
            vec!["mat".to_string(), "buoy".to_string()],
            AvoidParams {
                max_lags,
                ..AvoidParams::default()
            },
            Arc::new(perception.clone()),
            actuator.clone(),
        );
        MissionAssembler::new("gate_avoid").build(&mission).unwrap()
    }

    #[test]
    fn test_lags_until_clear() {
        let perception = ScriptedPerception::new()
            .with_visibility("mat", [true, false, false])
            .with_visibility("buoy", [false, true, false]);
        let actuator = Arc::new(RecordingActuator::new());
        let mut engine = build(&perception, &actuator, 5);

        assert_eq!(engine.run().unwrap(), RunOutcome::Done);
        let marches = actuator.marches();
        assert_eq!(marches.len(), 2);
        assert!(marches.iter().all(|m| m.direction == Direction::Left));
        assert_eq!(perception.polls("mat"), 3);
        assert_eq!(perception.polls("buoy"), 3);
        assert_eq!(perception.listening(), 0);
    }

    #[test]
    fn test_lag_budget_aborts() {
        let perception = ScriptedPerception::new().with_visibility("mat", [true]);
        let actuator = Arc::new(RecordingActuator::new());
        let mut engine = build(&perception, &actuator, 3);

        assert_eq!(engine.run().unwrap(), RunOutcome::Aborted);
        assert_eq!(actuator.marches().len(), 3);
    }

    #[test]
    fn test_obstacles_required() {
        let mission = AvoidMission::new(
            "front",
            Vec::new(),
            AvoidParams::default(),
            Arc::new(ScriptedPerception::new()),
            Arc::new(RecordingActuator::new()),
        );
        let result = MissionAssembler::new("gate_avoid").build(&mission);
        assert!(matches!(result, Err(MissionError::InvalidParameter { .. })));
    }
}
