//! Mission assembly errors.

use missionfsm_core::{CallbackError, CoreError};
use thiserror::Error;

/// Errors raised while assembling or running a mission.
#[derive(Debug, Error)]
pub enum MissionError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid mission parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("collaborator error: {0}")]
    Collaborator(#[from] CallbackError),
}

impl MissionError {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        MissionError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns an error code suitable for exit reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            MissionError::Core(e) => e.error_code(),
            MissionError::InvalidParameter { .. } => "INVALID_PARAMETER",
            MissionError::Collaborator(_) => "COLLABORATOR_ERROR",
        }
    }
}
