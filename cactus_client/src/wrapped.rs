//! Server-side failures re-raised on the client.

use cactus_common::failure::simple_type_name;
use cactus_common::{FailureDetails, TestFailure};
use thiserror::Error;

/// A failure reported by the redirector, keeping the original type name,
/// message and rendered trace.
///
/// Assertion-style failures are kept apart so test runners can report them
/// as failures rather than errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WrappedFailure {
    #[error("{}", .0.message)]
    Assertion(FailureDetails),

    #[error("{}", .0.message)]
    Error(FailureDetails),
}

impl WrappedFailure {
    pub fn new(details: FailureDetails) -> Self {
        if details.is_assertion() {
            WrappedFailure::Assertion(details)
        } else {
            WrappedFailure::Error(details)
        }
    }

    pub fn details(&self) -> &FailureDetails {
        match self {
            WrappedFailure::Assertion(details) | WrappedFailure::Error(details) => details,
        }
    }

    /// Type name of the original failure, e.g. `IllegalStateException`.
    pub fn wrapped_class_name(&self) -> &str {
        &self.details().class_name
    }

    pub fn message(&self) -> &str {
        &self.details().message
    }

    /// The server-side trace, as rendered text.
    pub fn stack_trace(&self) -> &str {
        &self.details().stack_trace
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, WrappedFailure::Assertion(_))
    }

    /// Matches the full type name or its last path segment.
    pub fn is_kind(&self, type_name: &str) -> bool {
        let class_name = self.wrapped_class_name();
        class_name == type_name || simple_type_name(class_name) == type_name
    }

    /// The failure as a test outcome, under its original type name.
    pub fn to_failure(&self) -> TestFailure {
        TestFailure::new(self.wrapped_class_name(), self.message())
    }
}
