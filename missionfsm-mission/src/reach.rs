//! Reach mission: find a target, center on it and march until arrival.
//!
//! ```text
//! INIT -> [custom_avoid] -> condition_visible --f--> rotate_search --+
//!                                  ^    |s                           |
//!                                  |    v                            |
//!                                  +- condition_centering <----------+
//!                                  |    |s
//!                                  |    v
//!                                  |  move_march -> condition_in_front --s--> DONE
//!                                  |                        |f
//!                                  +------------------------+ (via custom_avoid if set)
//! ```
//!
//! `condition_centering` delegates to a [`CenteringMission`] sub-machine and
//! `custom_avoid` to an [`AvoidMission`] sub-machine. The avoid branch only
//! exists when obstacles are listed. Nothing in the mission routes to
//! ABORTED on its own; only the external abort trigger does.

use crate::assembler::{Fragment, MissionAssembler, MissionTemplate, Namespace};
use crate::avoid::{AvoidMission, AvoidParams};
use crate::centering::{CenteringMission, CenteringParams};
use crate::collaborators::{
    detection_action, march_action, poll, rotate_action, share_event, Actuator, Confirmation,
    Direction, EventSpec, Motion, Perception, Rotation, Side,
};
use crate::error::MissionError;
use missionfsm_core::{shared, CallbackError, Lifecycle, Literal, OutcomeMap, Scene};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Reach tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReachParams {
    /// Turning side while searching.
    pub rotate: Side,
    /// Degrees per search turn.
    pub search_angle: f64,
    pub march: Motion,
    /// Listening time per visibility check.
    pub settle_ms: u64,
    /// Pause before each arrival check.
    pub arrival_delay_ms: u64,
    /// Consecutive detections that confirm the target.
    pub confirmation: u32,
    pub centering: CenteringParams,
    pub avoid: AvoidParams,
}

impl Default for ReachParams {
    fn default() -> Self {
        Self {
            rotate: Side::Left,
            search_angle: 5.0,
            march: Motion {
                direction: Direction::Forward,
                velocity: 0.4,
                duration_ms: 1500,
            },
            settle_ms: 500,
            arrival_delay_ms: 1000,
            confirmation: 2,
            centering: CenteringParams::default(),
            avoid: AvoidParams::default(),
        }
    }
}

impl ReachParams {
    /// Parameters without any waiting, for simulation.
    pub fn instant() -> Self {
        Self {
            settle_ms: 0,
            arrival_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), MissionError> {
        if !(self.search_angle.is_finite() && self.search_angle > 0.0) {
            return Err(MissionError::invalid("search_angle", "must be positive"));
        }
        if !(self.march.velocity.is_finite() && self.march.velocity > 0.0) {
            return Err(MissionError::invalid("march velocity", "must be positive"));
        }
        if self.confirmation == 0 {
            return Err(MissionError::invalid("confirmation", "must be at least 1"));
        }
        self.centering.validate()?;
        self.avoid.validate()
    }

    fn search_rotation(&self) -> Rotation {
        Rotation {
            angle: self.search_angle,
            side: self.rotate,
        }
    }
}

/// Reaches `target` as seen by `camera`.
pub struct ReachMission {
    camera: String,
    target: String,
    avoid: Vec<String>,
    params: ReachParams,
    perception: Arc<dyn Perception>,
    actuator: Arc<dyn Actuator>,
}

impl ReachMission {
    pub fn new(
        camera: impl Into<String>,
        target: impl Into<String>,
        perception: Arc<dyn Perception>,
        actuator: Arc<dyn Actuator>,
    ) -> Self {
        Self {
            camera: camera.into(),
            target: target.into(),
            avoid: Vec::new(),
            params: ReachParams::default(),
            perception,
            actuator,
        }
    }

    pub fn with_params(mut self, params: ReachParams) -> Self {
        self.params = params;
        self
    }

    /// Obstacles to steer around before each approach.
    pub fn with_avoid<I, S>(mut self, obstacles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.avoid = obstacles.into_iter().map(Into::into).collect();
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl MissionTemplate for ReachMission {
    fn kind(&self) -> &'static str {
        "reach"
    }

    fn fragment(&self, ns: &Namespace, lc: &Lifecycle) -> Result<Fragment, MissionError> {
        self.params.validate()?;
        let params = &self.params;

        let visible = ns.qualify("condition_visible");
        let search = ns.qualify("rotate_search");
        let centering = ns.qualify("condition_centering");
        let march = ns.qualify("move_march");
        let in_front = ns.qualify("condition_in_front");
        let avoid = ns.qualify("custom_avoid");

        let succeeded = ns.qualify("condition_s");
        let failed = ns.qualify("condition_f");
        let searched = ns.qualify("search");
        let next = ns.qualify("next");
        let avoided = ns.qualify("avoid");
        let outcomes = OutcomeMap::new(&succeeded, &failed);

        let spec = EventSpec::objects(
            &self.camera,
            self.target.as_str(),
            Confirmation::Count(params.confirmation),
        );
        let event = share_event(self.perception.event(&spec)?);
        let settle = Duration::from_millis(params.settle_ms);
        let arrival_delay = Duration::from_millis(params.arrival_delay_ms);

        let target_visible = {
            let event = event.clone();
            move || -> Result<bool, CallbackError> {
                let seen = poll(&event, settle)?;
                tracing::debug!(seen, "target visibility");
                Ok(seen)
            }
        };

        // Arrived once the target has dropped out of view
        let arrived = move || -> Result<bool, CallbackError> {
            if !arrival_delay.is_zero() {
                thread::sleep(arrival_delay);
            }
            Ok(!poll(&event, settle)?)
        };

        let centering_mission = CenteringMission::new(
            self.camera.as_str(),
            self.target.as_str(),
            params.centering.clone(),
            self.perception.clone(),
            self.actuator.clone(),
        );
        let centering_machine =
            MissionAssembler::new(ns.child("centering")).build(&centering_mission)?;

        let has_avoid = !self.avoid.is_empty();
        let entry = if has_avoid { &avoid } else { &visible };

        let mut fragment = Fragment::new(entry);
        if has_avoid {
            let avoid_machine = MissionAssembler::new(ns.child("avoid")).build(
                &AvoidMission::new(
                    self.camera.as_str(),
                    self.avoid.clone(),
                    params.avoid.clone(),
                    self.perception.clone(),
                    self.actuator.clone(),
                )
                .with_settle(settle)
                .with_confirmation(Confirmation::Count(params.confirmation)),
            )?;

            // Either avoidance outcome resumes the approach
            fragment
                .state(&avoid)
                .transition(&avoided, &avoid, &visible)
                .scene(
                    &avoid,
                    Scene::sub_machine(shared(avoid_machine), OutcomeMap::new(&avoided, &avoided)),
                );
        }

        fragment
            .state(&visible)
            .state(&search)
            .state(&centering)
            .state(&march)
            .state(&in_front)
            .transition(&failed, &visible, &search)
            .transition(&succeeded, &visible, &centering)
            .transition(&searched, &search, &visible)
            .transition(&failed, &centering, &visible)
            .transition(&succeeded, &centering, &march)
            .transition(&next, &march, &in_front)
            .transition(&succeeded, &in_front, &lc.done)
            .transition(&failed, &in_front, entry)
            .scene(&visible, Scene::condition(target_visible, outcomes.clone()))
            .scene(&in_front, Scene::condition(arrived, outcomes.clone()))
            .scene(
                &search,
                Scene::action(
                    rotate_action(self.actuator.clone()),
                    params.search_rotation().to_args(),
                ),
            )
            .scene(&centering, Scene::sub_machine(shared(centering_machine), outcomes))
            .scene(
                &march,
                Scene::action(march_action(self.actuator.clone()), params.march.to_args()),
            );

        fragment.init_action = Some(Scene::action(
            detection_action(self.actuator.clone()),
            vec![Literal::from(self.camera.as_str()), Literal::Bool(true)],
        ));

        Ok(fragment)
    }
}
