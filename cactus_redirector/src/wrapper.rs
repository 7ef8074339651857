//! Wrapped tests: plain unit tests run inside the container.
//!
//! The client names a wrapper class in `Cactus_TestClass` and the plain test
//! in `Cactus_WrappedTestClass`. The wrapper receives the implicit objects
//! and publishes them to the plain test for the duration of its run; the
//! plain test reads them with [`current_implicit_objects`].

use crate::implicit::ImplicitSlot;
use crate::implicit::ejb::EjbFields;
use crate::implicit::jsp::JspFields;
use crate::implicit::message::MessageFields;
use crate::implicit::web::ServletFields;
use crate::test_case::{InstantiationError, TestCase, TestFactory, run_bare};
use cactus_common::TestResult;
use std::cell::RefCell;

pub const SERVLET_TEST_CASE_WRAPPER: &str = "ServletTestCaseWrapper";
pub const JSP_TEST_CASE_WRAPPER: &str = "JspTestCaseWrapper";
pub const EJB_TEST_CASE_WRAPPER: &str = "EjbTestCaseWrapper";
pub const MESSAGE_TEST_CASE_WRAPPER: &str = "MessageTestCaseWrapper";

/// Implicit objects held by a wrapper.
#[derive(Debug, Clone)]
pub enum WrappedObjects {
    Servlet(ServletFields),
    Jsp(JspFields),
    Ejb(EjbFields),
    Message(MessageFields),
}

impl WrappedObjects {
    fn slot(&mut self) -> ImplicitSlot<'_> {
        match self {
            WrappedObjects::Servlet(fields) => ImplicitSlot::Servlet(fields),
            WrappedObjects::Jsp(fields) => ImplicitSlot::Jsp(fields),
            WrappedObjects::Ejb(fields) => ImplicitSlot::Ejb(fields),
            WrappedObjects::Message(fields) => ImplicitSlot::Message(fields),
        }
    }
}

thread_local! {
    static CURRENT: RefCell<Option<WrappedObjects>> = const { RefCell::new(None) };
}

/// Implicit objects of the wrapper running the current test on this thread.
pub fn current_implicit_objects() -> Option<WrappedObjects> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Restores the previously published objects, also when the wrapped test
/// panics.
struct Published(Option<WrappedObjects>);

impl Published {
    fn new(objects: WrappedObjects) -> Self {
        Self(CURRENT.with(|current| current.replace(Some(objects))))
    }
}

impl Drop for Published {
    fn drop(&mut self) {
        let previous = self.0.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}

pub struct WrapperTest {
    class_name: String,
    wrapped: Box<dyn TestCase>,
    objects: WrappedObjects,
}

impl WrapperTest {
    pub fn wrapped(&self) -> &dyn TestCase {
        self.wrapped.as_ref()
    }
}

impl TestCase for WrapperTest {
    fn name(&self) -> &str {
        self.wrapped.name()
    }

    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn run_test(&mut self) -> TestResult {
        let _published = Published::new(self.objects.clone());
        run_bare(self.wrapped.as_mut())
    }

    fn implicit_slot(&mut self) -> Option<ImplicitSlot<'_>> {
        Some(self.objects.slot())
    }
}

/// Factory for one of the framework's wrapper classes.
#[derive(Debug, Clone)]
pub struct WrapperClass {
    class_name: &'static str,
    empty: WrappedObjects,
}

impl WrapperClass {
    pub fn servlet() -> Self {
        Self {
            class_name: SERVLET_TEST_CASE_WRAPPER,
            empty: WrappedObjects::Servlet(ServletFields::default()),
        }
    }

    pub fn jsp() -> Self {
        Self {
            class_name: JSP_TEST_CASE_WRAPPER,
            empty: WrappedObjects::Jsp(JspFields::default()),
        }
    }

    pub fn ejb() -> Self {
        Self {
            class_name: EJB_TEST_CASE_WRAPPER,
            empty: WrappedObjects::Ejb(EjbFields::default()),
        }
    }

    pub fn message() -> Self {
        Self {
            class_name: MESSAGE_TEST_CASE_WRAPPER,
            empty: WrappedObjects::Message(MessageFields::default()),
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::servlet(), Self::jsp(), Self::ejb(), Self::message()]
    }
}

impl TestFactory for WrapperClass {
    fn class_name(&self) -> &str {
        self.class_name
    }

    fn instantiate(&self, _test_name: &str) -> Result<Box<dyn TestCase>, InstantiationError> {
        Err(InstantiationError::WrapperOnly(self.class_name.to_string()))
    }

    fn instantiate_wrapper(
        &self,
        _test_name: &str,
        wrapped: Box<dyn TestCase>,
    ) -> Result<Box<dyn TestCase>, InstantiationError> {
        Ok(Box::new(WrapperTest {
            class_name: self.class_name.to_string(),
            wrapped,
            objects: self.empty.clone(),
        }))
    }
}
