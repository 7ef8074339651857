//! The throwable model shared by test bodies, hooks and the result envelope.

use std::{any::Any, backtrace::Backtrace, backtrace::BacktraceStatus, fmt};

/// Type name of assertion failures raised by the framework.
pub const ASSERTION_FAILED_ERROR: &str = "AssertionFailedError";
/// Type name of equality assertion failures.
pub const COMPARISON_FAILURE: &str = "ComparisonFailure";
/// Type name given to panics that are not assertions.
pub const PANIC: &str = "Panic";

/// Outcome of a test phase or hook.
pub type TestResult = Result<(), TestFailure>;

/// Last path segment of a type name, for both `a.b.C` and `a::b::C` styles.
pub fn simple_type_name(name: &str) -> &str {
    let after_colons = name.rsplit("::").next().unwrap_or(name);
    after_colons.rsplit('.').next().unwrap_or(after_colons)
}

/// True when the type name denotes an assertion-style failure, which test
/// runners report as a failure rather than an error.
pub fn is_assertion_kind(type_name: &str) -> bool {
    matches!(
        simple_type_name(type_name),
        ASSERTION_FAILED_ERROR | COMPARISON_FAILURE
    )
}

/// A failure raised by test code: type name, message, trace frames and an
/// optional cause.
///
/// Any `std::error::Error` converts into a `TestFailure`, so `?` works inside
/// test bodies and hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFailure {
    type_name: String,
    message: String,
    frames: Vec<String>,
    cause: Option<Box<TestFailure>>,
}

impl TestFailure {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            frames: Vec::new(),
            cause: None,
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(ASSERTION_FAILED_ERROR, message)
    }

    /// Converts a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "test panicked".to_string());
        if message.starts_with("assertion") {
            Self::assertion(message)
        } else {
            Self::new(PANIC, message)
        }
    }

    /// Appends a trace frame.
    pub fn at(mut self, frame: impl Into<String>) -> Self {
        self.frames.push(frame.into());
        self
    }

    pub fn with_cause(mut self, cause: TestFailure) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn cause(&self) -> Option<&TestFailure> {
        self.cause.as_deref()
    }

    /// Matches the full type name or its last path segment.
    pub fn is_kind(&self, type_name: &str) -> bool {
        self.type_name == type_name || simple_type_name(&self.type_name) == type_name
    }

    pub fn is_assertion(&self) -> bool {
        is_assertion_kind(&self.type_name)
    }

    /// Renders the failure and its causes as plain text.
    pub fn render_trace(&self) -> String {
        let mut out = String::new();
        let mut current = Some(self);
        let mut first = true;
        while let Some(failure) = current {
            if !first {
                out.push_str("Caused by: ");
            }
            out.push_str(&failure.to_string());
            for frame in &failure.frames {
                out.push_str("\n\tat ");
                out.push_str(frame);
            }
            current = failure.cause();
            if current.is_some() {
                out.push('\n');
            }
            first = false;
        }
        out
    }
}

impl fmt::Display for TestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.type_name)
        } else {
            write!(f, "{}: {}", self.type_name, self.message)
        }
    }
}

impl<E: std::error::Error + 'static> From<E> for TestFailure {
    fn from(err: E) -> Self {
        let mut failure = TestFailure::new(std::any::type_name::<E>(), err.to_string());

        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            failure.frames = backtrace
                .to_string()
                .lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect();
        }

        // Source types are erased behind `dyn Error`, so causes only keep text.
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(inner) = source {
            causes.push(TestFailure::new("cause", inner.to_string()));
            source = inner.source();
        }
        let chained = causes
            .into_iter()
            .rev()
            .reduce(|inner, outer| outer.with_cause(inner));
        if let Some(cause) = chained {
            failure = failure.with_cause(cause);
        }
        failure
    }
}

/// Fails the current test with an assertion-kind failure.
pub fn fail(message: impl Into<String>) -> TestResult {
    Err(TestFailure::assertion(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn simple_names_strip_both_path_styles() {
        assert_eq!(simple_type_name("junit.framework.AssertionFailedError"), "AssertionFailedError");
        assert_eq!(simple_type_name("std::io::error::Error"), "Error");
        assert_eq!(simple_type_name("Plain"), "Plain");
    }

    #[test]
    fn assertion_kinds_are_recognised_by_simple_name() {
        assert!(is_assertion_kind("AssertionFailedError"));
        assert!(is_assertion_kind("junit.framework.ComparisonFailure"));
        assert!(!is_assertion_kind("IllegalStateException"));
    }

    #[test]
    fn errors_convert_with_their_type_name() {
        fn body() -> TestResult {
            let lookup: Result<(), io::Error> =
                Err(io::Error::new(io::ErrorKind::NotFound, "no such page"));
            lookup?;
            Ok(())
        }
        let failure = body().unwrap_err();
        assert!(failure.is_kind("Error"));
        assert!(failure.type_name().contains("io"));
        assert_eq!(failure.message(), "no such page");
    }

    #[test]
    fn panics_with_assertion_text_are_assertions() {
        let payload = std::panic::catch_unwind(|| {
            assert_eq!(1 + 1, 3, "math");
        })
        .unwrap_err();
        assert!(TestFailure::from_panic(payload).is_assertion());

        let payload: Box<dyn Any + Send> = Box::new("index out of bounds".to_string());
        let failure = TestFailure::from_panic(payload);
        assert_eq!(failure.type_name(), PANIC);
        assert_eq!(failure.message(), "index out of bounds");
    }

    #[test]
    fn rendered_trace_lists_frames_and_causes() {
        let failure = TestFailure::new("IllegalStateException", "boom")
            .at("SampleTest.testBar")
            .with_cause(TestFailure::new("IoError", "disk").at("Disk.read"));
        assert_eq!(
            failure.render_trace(),
            "IllegalStateException: boom\n\tat SampleTest.testBar\nCaused by: IoError: disk\n\tat Disk.read"
        );
    }

    #[test]
    fn fail_produces_an_assertion() {
        let failure = fail("expected a cookie").unwrap_err();
        assert!(failure.is_assertion());
        assert_eq!(failure.to_string(), "AssertionFailedError: expected a cookie");
    }
}
