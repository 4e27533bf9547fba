//! Callback wrapping and condition outcomes.
//!
//! Externally supplied callables (preparation actions, conditions) are
//! invoked through [`invoke`], which turns both `Err` returns and panics into
//! a [`CallbackResult::Failed`] instead of letting them unwind into the
//! engine loop.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// Error reported by a collaborator callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CallbackError {
    message: String,
}

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for CallbackError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for CallbackError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Structured callback result: `{"status": "ok", "data": ...}` or
/// `{"status": "failed", "data": "<error>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum CallbackResult<T> {
    Ok(T),
    Failed(String),
}

impl<T> CallbackResult<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, CallbackResult::Ok(_))
    }

    pub fn into_result(self) -> Result<T, CallbackError> {
        match self {
            CallbackResult::Ok(value) => Ok(value),
            CallbackResult::Failed(message) => Err(CallbackError::from(message)),
        }
    }
}

/// Invokes `callback` with `ctx` and captures how it finished.
///
/// The type system already guarantees the callback is invocable, so the
/// only failures left to normalize are error returns and panics.
pub fn invoke<C, T, F>(ctx: &C, callback: F) -> CallbackResult<T>
where
    C: ?Sized,
    F: FnOnce(&C) -> Result<T, CallbackError>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| callback(ctx))) {
        Ok(Ok(value)) => CallbackResult::Ok(value),
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "callback failed");
            CallbackResult::Failed(err.to_string())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!(panic = %message, "callback panicked");
            CallbackResult::Failed(format!("callback panicked: {}", message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Discrete outcome of a condition or a delegated sub-machine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Succeeded,
    Failed,
}

impl Outcome {
    /// Integer convention: non-zero means succeeded.
    pub fn from_code(code: i64) -> Self {
        if code != 0 {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        }
    }

    pub fn is_success(self) -> bool {
        self == Outcome::Succeeded
    }
}

impl From<bool> for Outcome {
    fn from(b: bool) -> Self {
        if b {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        }
    }
}

impl From<i64> for Outcome {
    fn from(code: i64) -> Self {
        Outcome::from_code(code)
    }
}

impl From<i32> for Outcome {
    fn from(code: i32) -> Self {
        Outcome::from_code(code as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invoke_success_passes_context() {
        let ctx = json!({"state_name": "CHECK"});
        let result = invoke(&ctx, |ctx| {
            Ok(ctx["state_name"].as_str().unwrap_or_default().to_lowercase())
        });
        assert_eq!(result, CallbackResult::Ok("check".to_string()));
    }

    #[test]
    fn test_invoke_error_becomes_failure() {
        let result: CallbackResult<bool> =
            invoke(&(), |_| Err(CallbackError::new("camera offline")));
        assert_eq!(result, CallbackResult::Failed("camera offline".to_string()));
        assert!(result.into_result().is_err());
    }

    #[test]
    fn test_invoke_panic_becomes_failure() {
        let result: CallbackResult<bool> = invoke(&(), |_| panic!("sensor exploded"));
        match result {
            CallbackResult::Failed(message) => assert!(message.contains("sensor exploded")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_result_shape() {
        let ok: CallbackResult<i32> = CallbackResult::Ok(1);
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": "ok", "data": 1})
        );

        let failed: CallbackResult<i32> = CallbackResult::Failed("boom".to_string());
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"status": "failed", "data": "boom"})
        );
    }

    #[test]
    fn test_outcome_conversions() {
        assert_eq!(Outcome::from(true), Outcome::Succeeded);
        assert_eq!(Outcome::from(0), Outcome::Failed);
        assert_eq!(Outcome::from(2i64), Outcome::Succeeded);
        assert!(!Outcome::Failed.is_success());
    }
}
