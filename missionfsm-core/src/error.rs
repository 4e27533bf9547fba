//! Core error types.

use thiserror::Error;

/// Errors from the state machine engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("invalid state: '{state}' is not registered")]
    InvalidState { state: String },

    #[error("no matching transition: cannot fire '{trigger}' in state '{state}'")]
    NoMatchingTransition { state: String, trigger: String },

    #[error("run ended in '{state}', which is neither done nor aborted")]
    Termination { state: String },

    #[error("rulebook parse error at line {line}: {reason}")]
    RulebookParse { line: usize, reason: String },

    #[error("preparation action for '{state}' failed: {reason}")]
    Action { state: String, reason: String },

    #[error("sub-machine in state '{state}' failed: {source}")]
    SubMachine {
        state: String,
        #[source]
        source: Box<CoreError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        CoreError::Configuration {
            reason: reason.into(),
        }
    }

    /// Returns true for errors raised while assembling a machine, as opposed
    /// to errors raised during a run.
    pub fn is_assembly_error(&self) -> bool {
        matches!(
            self,
            CoreError::Configuration { .. } | CoreError::RulebookParse { .. }
        )
    }

    /// Returns an error code suitable for exit reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::Configuration { .. } => "CONFIGURATION_ERROR",
            CoreError::InvalidState { .. } => "INVALID_STATE",
            CoreError::NoMatchingTransition { .. } => "NO_MATCHING_TRANSITION",
            CoreError::Termination { .. } => "TERMINATION_ERROR",
            CoreError::RulebookParse { .. } => "RULEBOOK_PARSE_ERROR",
            CoreError::Action { .. } => "ACTION_FAILED",
            CoreError::SubMachine { source, .. } => source.error_code(),
            CoreError::Io(_) => "IO_ERROR",
            CoreError::Json(_) => "SERIALIZATION_ERROR",
        }
    }
}
