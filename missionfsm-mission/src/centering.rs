//! Centering mission: turn until the target sits within tolerance.
//!
//! ```text
//! INIT -> condition_centered --s--> DONE
//!               |  ^
//!              f|  |correct
//!               v  |
//!          rotate_correct
//! ```
//!
//! A lost target or an exhausted correction budget escalates to ABORTED.

use crate::assembler::{Fragment, MissionTemplate, Namespace};
use crate::collaborators::{Actuator, Perception, Rotation};
use crate::error::MissionError;
use missionfsm_core::{CallbackError, FireContext, Lifecycle, Literal, OutcomeMap, Scene};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Centering tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CenteringParams {
    /// Largest acceptable bearing, in degrees.
    pub tolerance: f64,
    /// Corrections allowed per run.
    pub max_attempts: u32,
}

impl Default for CenteringParams {
    fn default() -> Self {
        Self {
            tolerance: 6.0,
            max_attempts: 10,
        }
    }
}

impl CenteringParams {
    pub fn validate(&self) -> Result<(), MissionError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(MissionError::invalid("tolerance", "must be a positive number of degrees"));
        }
        if self.max_attempts == 0 {
            return Err(MissionError::invalid("max_attempts", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Progress {
    corrections: u32,
    bearing: f64,
}

/// Turns towards `target` until it is centered in `camera`.
pub struct CenteringMission {
    camera: String,
    target: String,
    params: CenteringParams,
    perception: Arc<dyn Perception>,
    actuator: Arc<dyn Actuator>,
}

impl CenteringMission {
    pub fn new(
        camera: impl Into<String>,
        target: impl Into<String>,
        params: CenteringParams,
        perception: Arc<dyn Perception>,
        actuator: Arc<dyn Actuator>,
    ) -> Self {
        Self {
            camera: camera.into(),
            target: target.into(),
            params,
            perception,
            actuator,
        }
    }
}

impl MissionTemplate for CenteringMission {
    fn kind(&self) -> &'static str {
        "centering"
    }

    fn fragment(&self, ns: &Namespace, lc: &Lifecycle) -> Result<Fragment, MissionError> {
        self.params.validate()?;

        let centered = ns.qualify("condition_centered");
        let correct = ns.qualify("rotate_correct");
        let succeeded = ns.qualify("condition_s");
        let failed = ns.qualify("condition_f");
        let corrected = ns.qualify("correct");

        let progress = Arc::new(Mutex::new(Progress::default()));

        let condition = {
            let progress = progress.clone();
            let perception = self.perception.clone();
            let camera = self.camera.clone();
            let target = self.target.clone();
            let tolerance = self.params.tolerance;
            let max_attempts = self.params.max_attempts;

            move || -> Result<bool, CallbackError> {
                let bearing = perception
                    .bearing(&camera, &target)?
                    .ok_or_else(|| CallbackError::new(format!("lost sight of '{}'", target)))?;
                if bearing.abs() <= tolerance {
                    return Ok(true);
                }

                let mut progress = progress.lock();
                if progress.corrections >= max_attempts {
                    return Err(CallbackError::new(format!(
                        "'{}' still {:.1} degrees off after {} corrections",
                        target, bearing, progress.corrections
                    )));
                }
                progress.corrections += 1;
                progress.bearing = bearing;
                Ok(false)
            }
        };

        let correction = {
            let progress = progress.clone();
            let actuator = self.actuator.clone();
            move |_: &FireContext<'_>, _: &[Literal]| -> Result<(), CallbackError> {
                let bearing = progress.lock().bearing;
                actuator.rotate(Rotation::signed(bearing))
            }
        };

        // Every run starts with a full correction budget
        let reset = move |_: &FireContext<'_>, _: &[Literal]| -> Result<(), CallbackError> {
            *progress.lock() = Progress::default();
            Ok(())
        };

        let mut fragment = Fragment::new(&centered);
        fragment
            .state(&centered)
            .state(&correct)
            .transition(&succeeded, &centered, &lc.done)
            .transition(&failed, &centered, &correct)
            .transition(&corrected, &correct, &centered)
            .scene(
                &centered,
                Scene::condition(
                    condition,
                    OutcomeMap::new(&succeeded, &failed).escalate_errors_to(&lc.abort),
                ),
            )
            .scene(&correct, Scene::action(correction, Vec::new()));
        fragment.init_action = Some(Scene::action(reset, Vec::new()));

        Ok(fragment)
    }
}
