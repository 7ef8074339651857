//! Server-side test model.
//!
//! A [`TestCase`] is one test method bound to a fresh instance of its class.
//! Test classes are described by [`TestFactory`] values registered with a
//! class resolver; [`TestClass`] builds one from a fixture type and a table
//! of test methods.

use crate::implicit::ImplicitSlot;
use cactus_common::failure::{TestFailure, TestResult};
use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};
use thiserror::Error;

/// One test method on one test instance.
pub trait TestCase: Send {
    /// The test method name, e.g. `testFoo`.
    fn name(&self) -> &str;

    fn class_name(&self) -> &str;

    fn set_up(&mut self) -> TestResult {
        Ok(())
    }

    fn tear_down(&mut self) -> TestResult {
        Ok(())
    }

    fn run_test(&mut self) -> TestResult;

    /// Injection target for implicit objects. Tests that need none keep the
    /// default.
    fn implicit_slot(&mut self) -> Option<ImplicitSlot<'_>> {
        None
    }
}

fn guarded(phase: impl FnOnce() -> TestResult) -> TestResult {
    catch_unwind(AssertUnwindSafe(phase)).unwrap_or_else(|payload| Err(TestFailure::from_panic(payload)))
}

/// Runs set-up, the test body and tear-down.
///
/// A failed set-up skips the rest. Tear-down runs whenever set-up succeeded;
/// when both the body and tear-down fail, the body's failure is reported.
/// Panics in any phase are caught and reported as failures.
pub fn run_bare(test: &mut dyn TestCase) -> TestResult {
    guarded(|| test.set_up())?;
    let body = guarded(|| test.run_test());
    let tear_down = guarded(|| test.tear_down());
    body.and(tear_down)
}

#[derive(Error, Debug)]
pub enum InstantiationError {
    #[error("Failed to instantiate test class [{class_name}]: {failure}")]
    Constructor {
        class_name: String,
        failure: TestFailure,
    },

    #[error("Test class [{0}] is not a test wrapper")]
    NotAWrapper(String),

    #[error("Test class [{0}] can only be run wrapped around another test")]
    WrapperOnly(String),
}

/// A resolvable test class.
pub trait TestFactory: Send + Sync {
    fn class_name(&self) -> &str;

    /// Libraries (as class-path style names, e.g. `junit/framework/TestCase`)
    /// that must be present for this class to load.
    fn requirements(&self) -> &[String] {
        &[]
    }

    /// Constructs an instance bound to the given test method.
    fn instantiate(&self, test_name: &str) -> Result<Box<dyn TestCase>, InstantiationError>;

    /// Constructs a wrapper instance around an already built test.
    fn instantiate_wrapper(
        &self,
        _test_name: &str,
        _wrapped: Box<dyn TestCase>,
    ) -> Result<Box<dyn TestCase>, InstantiationError> {
        Err(InstantiationError::NotAWrapper(self.class_name().to_string()))
    }
}

/// State shared by the test methods of a [`TestClass`].
pub trait Fixture: Send + 'static {
    fn set_up(&mut self) -> TestResult {
        Ok(())
    }

    fn tear_down(&mut self) -> TestResult {
        Ok(())
    }

    fn implicit_slot(&mut self) -> Option<ImplicitSlot<'_>> {
        None
    }
}

pub type TestMethod<F> = fn(&mut F) -> TestResult;

type Constructor<F> = Arc<dyn Fn(&str) -> Result<F, TestFailure> + Send + Sync>;

/// A test class: a fixture constructor plus named test methods.
///
/// ```rust
/// use cactus_redirector::implicit::{ImplicitSlot, web::ServletFields};
/// use cactus_redirector::test_case::{Fixture, TestClass};
///
/// #[derive(Default)]
/// struct SampleTest {
///     servlet: ServletFields,
/// }
///
/// impl Fixture for SampleTest {
///     fn implicit_slot(&mut self) -> Option<ImplicitSlot<'_>> {
///         Some(ImplicitSlot::Servlet(&mut self.servlet))
///     }
/// }
///
/// let class = TestClass::new("SampleTest", |_| SampleTest::default())
///     .method("testNothing", |_| Ok(()));
/// assert!(class.has_method("testNothing"));
/// ```
pub struct TestClass<F> {
    class_name: String,
    constructor: Constructor<F>,
    methods: Vec<(String, TestMethod<F>)>,
    requirements: Vec<String>,
}

impl<F: Fixture> TestClass<F> {
    pub fn new(
        class_name: impl Into<String>,
        constructor: impl Fn(&str) -> F + Send + Sync + 'static,
    ) -> Self {
        Self::try_new(class_name, move |name| Ok(constructor(name)))
    }

    /// A class whose constructor may fail.
    pub fn try_new(
        class_name: impl Into<String>,
        constructor: impl Fn(&str) -> Result<F, TestFailure> + Send + Sync + 'static,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            constructor: Arc::new(constructor),
            methods: Vec::new(),
            requirements: Vec::new(),
        }
    }

    pub fn method(mut self, name: impl Into<String>, method: TestMethod<F>) -> Self {
        self.methods.push((name.into(), method));
        self
    }

    /// Declares a library this class needs at load time.
    pub fn requires(mut self, library: impl Into<String>) -> Self {
        self.requirements.push(library.into());
        self
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|(n, _)| n == name)
    }
}

impl<F> fmt::Debug for TestClass<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestClass")
            .field("class_name", &self.class_name)
            .field("methods", &self.methods.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("requirements", &self.requirements)
            .finish()
    }
}

impl<F: Fixture> TestFactory for TestClass<F> {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn requirements(&self) -> &[String] {
        &self.requirements
    }

    fn instantiate(&self, test_name: &str) -> Result<Box<dyn TestCase>, InstantiationError> {
        let fixture = guarded_constructor(|| (self.constructor)(test_name)).map_err(|failure| {
            InstantiationError::Constructor {
                class_name: self.class_name.clone(),
                failure,
            }
        })?;
        let method = self
            .methods
            .iter()
            .find(|(n, _)| n == test_name)
            .map(|(_, m)| *m);
        Ok(Box::new(FixtureTest {
            name: test_name.to_string(),
            class_name: self.class_name.clone(),
            fixture,
            method,
        }))
    }
}

fn guarded_constructor<F>(build: impl FnOnce() -> Result<F, TestFailure>) -> Result<F, TestFailure> {
    catch_unwind(AssertUnwindSafe(build)).unwrap_or_else(|payload| Err(TestFailure::from_panic(payload)))
}

struct FixtureTest<F> {
    name: String,
    class_name: String,
    fixture: F,
    method: Option<TestMethod<F>>,
}

impl<F: Fixture> TestCase for FixtureTest<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn set_up(&mut self) -> TestResult {
        self.fixture.set_up()
    }

    fn tear_down(&mut self) -> TestResult {
        self.fixture.tear_down()
    }

    fn run_test(&mut self) -> TestResult {
        match self.method {
            Some(method) => method(&mut self.fixture),
            None => Err(TestFailure::assertion(format!(
                "Method \"{}\" not found",
                self.name
            ))),
        }
    }

    fn implicit_slot(&mut self) -> Option<ImplicitSlot<'_>> {
        self.fixture.implicit_slot()
    }
}
