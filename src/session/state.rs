use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{field::FieldError, reading::ParseError, transport::TransportError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Connected,
    Streaming,
    Stopped,
    Failed,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

impl SessionState {
    /// `Stopped` and `Failed` end a session; retrying needs a new one.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connected => "connected",
            SessionState::Streaming => "streaming",
            SessionState::Stopped => "stopped",
            SessionState::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse class of the most recent error, for status text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ErrorClass {
    MalformedSyntax,
    LengthMismatch,
    NonNumericElement,
    InsufficientSamples,
    DegenerateSamples,
    TransportUnavailable,
    TransportDisconnected,
    NoDataYet,
}

impl ErrorClass {
    pub fn label(self) -> &'static str {
        match self {
            ErrorClass::MalformedSyntax => "malformed syntax",
            ErrorClass::LengthMismatch => "length mismatch",
            ErrorClass::NonNumericElement => "non-numeric element",
            ErrorClass::InsufficientSamples => "insufficient samples",
            ErrorClass::DegenerateSamples => "degenerate samples",
            ErrorClass::TransportUnavailable => "transport unavailable",
            ErrorClass::TransportDisconnected => "transport disconnected",
            ErrorClass::NoDataYet => "no data yet",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<&ParseError> for ErrorClass {
    fn from(err: &ParseError) -> Self {
        match err {
            ParseError::MalformedSyntax { .. } => ErrorClass::MalformedSyntax,
            ParseError::LengthMismatch { .. } => ErrorClass::LengthMismatch,
            ParseError::NonNumericElement { .. } => ErrorClass::NonNumericElement,
        }
    }
}

impl From<&FieldError> for ErrorClass {
    fn from(err: &FieldError) -> Self {
        match err {
            FieldError::InsufficientSamples { .. } => ErrorClass::InsufficientSamples,
            FieldError::DegenerateSamples { .. } => ErrorClass::DegenerateSamples,
        }
    }
}

impl From<&TransportError> for ErrorClass {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::Unavailable { .. } => ErrorClass::TransportUnavailable,
            TransportError::Disconnected { .. } => ErrorClass::TransportDisconnected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stopped_and_failed_are_terminal() {
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Connected.is_terminal());
        assert!(!SessionState::Streaming.is_terminal());
        assert!(SessionState::Stopped.is_terminal());
        assert!(SessionState::Failed.is_terminal());
    }

    #[test]
    fn serializes_camel_case() {
        assert_eq!(serde_json::to_string(&SessionState::Streaming).unwrap(), "\"streaming\"");
        assert_eq!(
            serde_json::to_string(&ErrorClass::TransportDisconnected).unwrap(),
            "\"transportDisconnected\""
        );
    }

    #[test]
    fn classifies_errors() {
        let err = ParseError::LengthMismatch {
            expected: 15,
            actual: 3,
        };
        assert_eq!(ErrorClass::from(&err), ErrorClass::LengthMismatch);
        assert_eq!(
            ErrorClass::from(&TransportError::disconnected("gone")),
            ErrorClass::TransportDisconnected
        );
        assert_eq!(
            ErrorClass::from(&FieldError::DegenerateSamples { found: 5 }),
            ErrorClass::DegenerateSamples
        );
    }
}
