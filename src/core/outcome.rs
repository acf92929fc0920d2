use serde::Serialize;
use std::fmt;

use super::error::{DaemonError, ErrorKind};

/// Result of one daemon operation: a success flag plus an explanation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub success: bool,
    /// Confirmation on success, the reason on failure (never empty)
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl Outcome {
    pub fn ok(explanation: impl Into<String>) -> Self {
        Self {
            success: true,
            explanation: explanation.into(),
            kind: None,
        }
    }

    pub fn failed(error: &DaemonError) -> Self {
        Self {
            success: false,
            explanation: error.to_string(),
            kind: Some(error.kind()),
        }
    }

    pub fn from_result(result: Result<(), DaemonError>, explanation: impl Into<String>) -> Self {
        match result {
            Ok(()) => Self::ok(explanation),
            Err(e) => Self::failed(&e),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// The failure text, if the operation failed
    pub fn error(&self) -> Option<&str> {
        (!self.success).then_some(self.explanation.as_str())
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(f, "{}", self.explanation)
        } else {
            write!(f, "Error: {}", self.explanation)
        }
    }
}

/// Every step of a composite operation, each reported on its own
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    /// Validation warnings that did not block the operation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub steps: Vec<Outcome>,
}

impl Report {
    pub fn push(&mut self, outcome: Outcome) -> bool {
        let success = outcome.is_success();
        self.steps.push(outcome);
        success
    }

    pub fn is_success(&self) -> bool {
        self.steps.iter().all(Outcome::is_success)
    }
}
