//! # missionfsm-mission
//!
//! Mission assembly on top of `missionfsm-core`.
//!
//! This crate provides:
//! - Namespaced mission fragments and the assembler that turns them into engines
//! - Perception and actuation interfaces for scene callbacks
//! - The reach mission with its centering and avoidance sub-missions
//! - Scripted collaborators for simulation

pub mod assembler;
pub mod avoid;
pub mod centering;
pub mod collaborators;
pub mod error;
pub mod reach;
pub mod scripted;

pub use assembler::{splice, Fragment, MissionAssembler, MissionTemplate, Namespace, Spliced};
pub use avoid::{AvoidMission, AvoidParams};
pub use centering::{CenteringMission, CenteringParams};
pub use collaborators::{
    Actuator, Confirmation, Direction, EventSpec, Motion, Perception, PerceptionEvent, Rotation,
    Side,
};
pub use error::MissionError;
pub use reach::{ReachMission, ReachParams};
pub use scripted::{visibility_script, Command, RecordingActuator, ScriptedPerception};
