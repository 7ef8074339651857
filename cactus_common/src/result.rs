//! The Result Envelope: outcome of one server-side test execution.

use crate::failure::{TestFailure, is_assertion_kind};
use std::fmt;

/// Details of a failed test as they cross the wire.
///
/// The stack trace is rendered text, never a live error value: the original
/// may reference container-bound objects that cannot leave the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetails {
    pub class_name: String,
    pub message: String,
    pub stack_trace: String,
}

impl FailureDetails {
    pub fn is_assertion(&self) -> bool {
        is_assertion_kind(&self.class_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebTestResult {
    Ok,
    Failed(FailureDetails),
}

impl WebTestResult {
    pub fn failed(
        class_name: impl Into<String>,
        message: impl Into<String>,
        stack_trace: impl Into<String>,
    ) -> Self {
        WebTestResult::Failed(FailureDetails {
            class_name: class_name.into(),
            message: message.into(),
            stack_trace: stack_trace.into(),
        })
    }

    pub fn has_exception(&self) -> bool {
        matches!(self, WebTestResult::Failed(_))
    }

    pub fn failure(&self) -> Option<&FailureDetails> {
        match self {
            WebTestResult::Ok => None,
            WebTestResult::Failed(details) => Some(details),
        }
    }
}

impl From<&TestFailure> for WebTestResult {
    fn from(failure: &TestFailure) -> Self {
        WebTestResult::failed(
            failure.type_name(),
            failure.message(),
            failure.render_trace(),
        )
    }
}

impl From<TestFailure> for WebTestResult {
    fn from(failure: TestFailure) -> Self {
        WebTestResult::from(&failure)
    }
}

impl fmt::Display for WebTestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTestResult::Ok => f.write_str("OK"),
            WebTestResult::Failed(details) => {
                write!(f, "[{}] {}", details.class_name, details.message)
            }
        }
    }
}
