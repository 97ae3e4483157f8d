//! Errors surfaced by delays and the event loop

use thiserror::Error;

/// Errors from delay and loop operations
///
/// `Clone` because the same failure is handed to every `error` listener.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DelayError {
    /// A step returned an error or panicked
    #[error("step {step} failed: {message}")]
    StepFailed { step: usize, message: String },

    #[error("event loop is already running")]
    LoopRunning,

    /// `wait` was called with nothing pending and nothing scheduled
    #[error("delay has no pending work")]
    Idle,

    /// The loop stopped before the delay reached finish or error
    #[error("event loop stopped before the delay settled")]
    Stalled,

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl DelayError {
    /// The failure message for a step error, if this is one
    pub fn step_message(&self) -> Option<&str> {
        match self {
            DelayError::StepFailed { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Result alias for delay operations
pub type DelayResult<T> = Result<T, DelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failed_display() {
        let err = DelayError::StepFailed {
            step: 2,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "step 2 failed: boom");
        assert_eq!(err.step_message(), Some("boom"));
    }

    #[test]
    fn test_step_message_none_for_loop_errors() {
        assert_eq!(DelayError::LoopRunning.step_message(), None);
        assert_eq!(DelayError::Stalled.step_message(), None);
    }
}
