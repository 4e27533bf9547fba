//! # missionfsm-core
//!
//! Hierarchical state machine engine for mission logic.
//!
//! This crate provides:
//! - Transition tables with (state, trigger) resolution and wildcard sources
//! - The step/run engine with lifecycle states INIT, DONE and ABORTED
//! - Per-state scenes: preparation actions, conditions and sub-machines
//! - Rulebook loading through a data-only literal parser
//! - Diagram export

pub mod callback;
pub mod diagram;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod literal;
pub mod machine;
pub mod rulebook;
pub mod scene;
pub mod table;

pub use callback::{CallbackError, CallbackResult, Outcome};
pub use engine::StateMachineEngine;
pub use error::CoreError;
pub use lifecycle::Lifecycle;
pub use literal::Literal;
pub use machine::{shared, Machine, RunOutcome, SharedMachine};
pub use rulebook::{Rulebook, RulebookLoader, UnknownLinePolicy};
pub use scene::{Action, Condition, FireContext, OutcomeMap, Scene, SceneKind, SceneRegistry};
pub use table::{Source, StateDef, StateKind, Transition, TransitionTable, WILDCARD};
