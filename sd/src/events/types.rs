//! Event vocabulary for delays

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DelayError;

/// The two channels a delay emits on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Finish,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Finish => "finish",
            EventKind::Error => "error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal signal from a delay
#[derive(Clone, Debug, PartialEq)]
pub enum DelayEvent {
    /// Every pending token resolved and the chain is exhausted
    Finish(Vec<Value>),
    /// A step failed; the delay is latched and will never finish
    Error(DelayError),
}

impl DelayEvent {
    /// Which channel this event is delivered on
    pub fn kind(&self) -> EventKind {
        match self {
            DelayEvent::Finish(_) => EventKind::Finish,
            DelayEvent::Error(_) => EventKind::Error,
        }
    }

    /// Finish arguments, if this is a finish event
    pub fn args(&self) -> Option<&[Value]> {
        match self {
            DelayEvent::Finish(args) => Some(args),
            DelayEvent::Error(_) => None,
        }
    }

    /// The failure, if this is an error event
    pub fn error(&self) -> Option<&DelayError> {
        match self {
            DelayEvent::Error(err) => Some(err),
            DelayEvent::Finish(_) => None,
        }
    }
}

impl From<Result<Vec<Value>, DelayError>> for DelayEvent {
    fn from(outcome: Result<Vec<Value>, DelayError>) -> Self {
        match outcome {
            Ok(args) => DelayEvent::Finish(args),
            Err(err) => DelayEvent::Error(err),
        }
    }
}
