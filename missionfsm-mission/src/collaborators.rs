//! Perception and actuation interfaces used by mission scenes.
//!
//! Missions never touch sensors or thrusters directly. Conditions talk to a
//! [`PerceptionEvent`] obtained from a [`Perception`] factory, and
//! preparation actions hand typed commands to an [`Actuator`]. Command
//! parameters travel through the scene's literal arguments, so a scene
//! entry reads the same whether it came from code or from a rulebook.

use missionfsm_core::{Action, CallbackError, FireContext, Literal};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Movement direction understood by the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CallbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(Direction::Forward),
            "backward" => Ok(Direction::Backward),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(CallbackError::new(format!("unknown direction '{}'", other))),
        }
    }
}

/// Turning side. Left is the positive rotation sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn sign(self) -> i64 {
        match self {
            Side::Left => 1,
            Side::Right => -1,
        }
    }

    pub fn from_sign(sign: i64) -> Self {
        if sign < 0 {
            Side::Right
        } else {
            Side::Left
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            Side::Left => Direction::Left,
            Side::Right => Direction::Right,
        }
    }
}

/// A timed translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub direction: Direction,
    pub velocity: f64,
    pub duration_ms: u64,
}

impl Motion {
    /// Scene arguments: `(direction, velocity, duration_ms)`.
    pub fn to_args(&self) -> Vec<Literal> {
        vec![
            Literal::from(self.direction.as_str()),
            Literal::Float(self.velocity),
            Literal::Int(self.duration_ms as i64),
        ]
    }

    pub fn from_args(args: &[Literal]) -> Result<Self, CallbackError> {
        match args {
            [direction, velocity, duration] => {
                let direction = direction
                    .as_str()
                    .ok_or_else(|| bad_arg("direction", direction))?
                    .parse()?;
                let velocity = velocity.as_f64().ok_or_else(|| bad_arg("velocity", velocity))?;
                let duration_ms = duration
                    .as_i64()
                    .and_then(|d| u64::try_from(d).ok())
                    .ok_or_else(|| bad_arg("duration", duration))?;
                Ok(Motion {
                    direction,
                    velocity,
                    duration_ms,
                })
            }
            _ => Err(CallbackError::new(format!(
                "motion takes (direction, velocity, duration), got {} arguments",
                args.len()
            ))),
        }
    }
}

/// A turn in place by `angle` degrees towards `side`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub angle: f64,
    pub side: Side,
}

impl Rotation {
    /// Builds a rotation from a signed angle.
    pub fn signed(angle: f64) -> Self {
        Self {
            angle: angle.abs(),
            side: if angle < 0.0 { Side::Right } else { Side::Left },
        }
    }

    /// Scene arguments: `(angle, sign)`.
    pub fn to_args(&self) -> Vec<Literal> {
        vec![Literal::Float(self.angle), Literal::Int(self.side.sign())]
    }

    pub fn from_args(args: &[Literal]) -> Result<Self, CallbackError> {
        match args {
            [angle, sign] => {
                let angle = angle.as_f64().ok_or_else(|| bad_arg("angle", angle))?;
                let sign = sign.as_i64().ok_or_else(|| bad_arg("sign", sign))?;
                Ok(Rotation {
                    angle,
                    side: Side::from_sign(sign),
                })
            }
            _ => Err(CallbackError::new(format!(
                "rotation takes (angle, sign), got {} arguments",
                args.len()
            ))),
        }
    }
}

fn bad_arg(name: &str, value: &Literal) -> CallbackError {
    CallbackError::new(format!("argument '{}' has unexpected type {}", name, value.kind()))
}

/// How many detections confirm an event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confirmation {
    /// Consecutive positive frames.
    Count(u32),
    /// Share of positive frames within the listening window.
    Window(f64),
}

/// Addresses one perception event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    pub topic: String,
    pub target: String,
    pub confirmation: Confirmation,
}

impl EventSpec {
    /// Object detection event on a camera's detection topic.
    pub fn objects(camera: &str, target: impl Into<String>, confirmation: Confirmation) -> Self {
        Self {
            topic: objects_topic(camera),
            target: target.into(),
            confirmation,
        }
    }
}

/// Detection topic of a camera.
pub fn objects_topic(camera: &str) -> String {
    format!("/missionfsm/{}/objects", camera)
}

/// A boolean sensor event.
pub trait PerceptionEvent: Send {
    fn start_listening(&mut self) -> Result<(), CallbackError>;

    fn stop_listening(&mut self) -> Result<(), CallbackError>;

    fn is_triggered(&mut self) -> Result<bool, CallbackError>;
}

/// Creates perception events and answers bearing queries.
pub trait Perception: Send + Sync {
    fn event(&self, spec: &EventSpec) -> Result<Box<dyn PerceptionEvent>, CallbackError>;

    /// Horizontal bearing of `target` in degrees, positive to the left.
    /// `None` when the target is not in view.
    fn bearing(&self, camera: &str, target: &str) -> Result<Option<f64>, CallbackError>;
}

/// A perception event shared between the conditions of one mission.
pub type SharedEvent = Arc<Mutex<Box<dyn PerceptionEvent>>>;

pub fn share_event(event: Box<dyn PerceptionEvent>) -> SharedEvent {
    Arc::new(Mutex::new(event))
}

/// Listens for `settle`, then reports whether the event fired.
pub fn poll(event: &SharedEvent, settle: Duration) -> Result<bool, CallbackError> {
    let mut event = event.lock();
    event.start_listening()?;
    if !settle.is_zero() {
        thread::sleep(settle);
    }
    let seen = event.is_triggered();
    event.stop_listening()?;
    seen
}

/// Vehicle motion commands.
pub trait Actuator: Send + Sync {
    fn march(&self, motion: Motion) -> Result<(), CallbackError>;

    fn rotate(&self, rotation: Rotation) -> Result<(), CallbackError>;

    fn enable_detection(&self, camera: &str, enabled: bool) -> Result<(), CallbackError>;
}

/// Preparation action running `march` with `(direction, velocity, duration_ms)` arguments.
pub fn march_action(actuator: Arc<dyn Actuator>) -> impl Action {
    move |_: &FireContext<'_>, args: &[Literal]| -> Result<(), CallbackError> {
        actuator.march(Motion::from_args(args)?)
    }
}

/// Preparation action running `rotate` with `(angle, sign)` arguments.
pub fn rotate_action(actuator: Arc<dyn Actuator>) -> impl Action {
    move |_: &FireContext<'_>, args: &[Literal]| -> Result<(), CallbackError> {
        actuator.rotate(Rotation::from_args(args)?)
    }
}

/// Preparation action toggling detection with `(camera, enabled)` arguments.
pub fn detection_action(actuator: Arc<dyn Actuator>) -> impl Action {
    move |_: &FireContext<'_>, args: &[Literal]| -> Result<(), CallbackError> {
        match args {
            [camera, enabled] => {
                let camera = camera.as_str().ok_or_else(|| bad_arg("camera", camera))?;
                let enabled = enabled.as_bool().ok_or_else(|| bad_arg("enabled", enabled))?;
                actuator.enable_detection(camera, enabled)
            }
            _ => Err(CallbackError::new("detection takes (camera, enabled)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_args() {
        let motion = Motion {
            direction: Direction::Forward,
            velocity: 0.4,
            duration_ms: 1500,
        };
        assert_eq!(Motion::from_args(&motion.to_args()).unwrap(), motion);

        let args = vec![Literal::from("up"), Literal::Float(0.4), Literal::Int(1)];
        assert!(Motion::from_args(&args).is_err());

        // Integer velocities widen
        let args = vec![Literal::from("left"), Literal::Int(1), Literal::Int(200)];
        assert_eq!(Motion::from_args(&args).unwrap().velocity, 1.0);

        let args = vec![Literal::from("left"), Literal::Int(1), Literal::Int(-5)];
        assert!(Motion::from_args(&args).is_err());
    }

    #[test]
    fn test_rotation_args() {
        let rotation = Rotation::signed(-12.5);
        assert_eq!(rotation.side, Side::Right);
        assert_eq!(rotation.angle, 12.5);
        assert_eq!(Rotation::from_args(&rotation.to_args()).unwrap(), rotation);

        assert!(Rotation::from_args(&[Literal::Float(5.0)]).is_err());
    }

    #[test]
    fn test_side_sign() {
        assert_eq!(Side::Left.sign(), 1);
        assert_eq!(Side::from_sign(-1), Side::Right);
        assert_eq!(Side::Right.direction(), Direction::Right);
    }
}
