//! Server-side test caller: the operations behind each service.

use crate::error::{RedirectorError, Result};
use crate::implicit::{ImplicitObjects, Inject, InjectionError};
use crate::resolver::{ClassLoadError, ClassResolver};
use crate::test_case::{InstantiationError, TestCase, run_bare};
use cactus_common::wire::{
    AUTOSESSION_NAME_PARAM, CLASS_NAME_PARAM, METHOD_NAME_PARAM, TEST_RESULTS_ATTRIBUTE,
    WRAPPED_CLASS_NAME_PARAM,
};
use cactus_common::{Service, TestFailure, VERSION, WebTestResult, parser};
use std::sync::Arc;
use tracing::{debug, info};

/// Why a test could not even start.
enum Abort {
    /// Reported as a fault.
    Fault(RedirectorError),
    /// Reported as the test's outcome.
    Failed(TestFailure),
}

impl From<ClassLoadError> for Abort {
    fn from(err: ClassLoadError) -> Self {
        match err {
            ClassLoadError::MissingDependency { class_name, missing } => {
                Abort::Fault(RedirectorError::MissingLibrary { class_name, missing })
            }
            other => Abort::Failed(other.into()),
        }
    }
}

impl From<InstantiationError> for Abort {
    fn from(err: InstantiationError) -> Self {
        match err {
            InstantiationError::Constructor { failure, .. } => Abort::Failed(failure),
            other => Abort::Failed(other.into()),
        }
    }
}

impl From<InjectionError> for Abort {
    fn from(err: InjectionError) -> Self {
        Abort::Failed(err.into())
    }
}

struct Target {
    class_name: String,
    method_name: String,
    wrapped_class_name: Option<String>,
}

fn prepare(
    resolver: &dyn ClassResolver,
    objects: &ImplicitObjects,
    target: &Target,
) -> std::result::Result<Box<dyn TestCase>, Abort> {
    let method = target.method_name.as_str();
    let mut test = match &target.wrapped_class_name {
        Some(wrapped) => {
            let inner = resolver.resolve(wrapped)?.instantiate(method)?;
            resolver
                .resolve(&target.class_name)?
                .instantiate_wrapper(method, inner)?
        }
        None => resolver.resolve(&target.class_name)?.instantiate(method)?,
    };
    objects.inject_into(test.as_mut())?;
    Ok(test)
}

fn execute(
    resolver: &dyn ClassResolver,
    objects: &ImplicitObjects,
    target: &Target,
) -> Result<WebTestResult> {
    match prepare(resolver, objects, target) {
        Ok(mut test) => Ok(match run_bare(test.as_mut()) {
            Ok(()) => WebTestResult::Ok,
            Err(failure) => {
                info!(
                    class_name = %target.class_name,
                    method_name = %target.method_name,
                    failure = %failure,
                    "Test failed"
                );
                WebTestResult::from(failure)
            }
        }),
        Err(Abort::Failed(failure)) => {
            info!(class_name = %target.class_name, failure = %failure, "Test could not be started");
            Ok(WebTestResult::from(failure))
        }
        Err(Abort::Fault(err)) => Err(err),
    }
}

/// Runs the services of one inbound request against its implicit objects.
pub struct TestCaller {
    objects: ImplicitObjects,
    resolver: Arc<dyn ClassResolver>,
}

impl TestCaller {
    pub fn new(objects: ImplicitObjects, resolver: Arc<dyn ClassResolver>) -> Self {
        Self { objects, resolver }
    }

    pub fn objects(&self) -> &ImplicitObjects {
        &self.objects
    }

    /// Runs the requested test method and stores its result in the context
    /// scope for a later `GET_RESULTS`.
    ///
    /// Missing class or method parameters and missing libraries are faults;
    /// everything that goes wrong from resolution to tear-down becomes the
    /// stored result.
    pub async fn do_test(&self) -> Result<()> {
        let params = self.objects.params();
        let target = Target {
            class_name: params.require(CLASS_NAME_PARAM, "test class name")?.to_string(),
            method_name: params.require(METHOD_NAME_PARAM, "test method name")?.to_string(),
            wrapped_class_name: params
                .get(WRAPPED_CLASS_NAME_PARAM)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        };
        debug!(
            class_name = %target.class_name,
            method_name = %target.method_name,
            wrapped = ?target.wrapped_class_name,
            auto_session = self.is_auto_session(),
            "Calling test"
        );

        let resolver = self.resolver.clone();
        let objects = self.objects.clone();
        let result = tokio::task::spawn_blocking(move || execute(resolver.as_ref(), &objects, &target))
            .await
            .map_err(|e| RedirectorError::Internal(format!("Test task failed: {e}")))??;

        debug!(result = %result, "Storing test result");
        self.objects.scope().set(TEST_RESULTS_ATTRIBUTE, result);
        Ok(())
    }

    /// Writes the stored result and removes it from the context scope.
    pub fn do_get_results(&self) -> Result<()> {
        let result = self
            .objects
            .scope()
            .take::<WebTestResult>(TEST_RESULTS_ATTRIBUTE)
            .ok_or(RedirectorError::NoTestResult)?;
        debug!(result = %result, "Returning test result");
        self.objects
            .body_writer()
            .write_body(&parser::to_xml(&result))
            .map_err(RedirectorError::Write)
    }

    /// Connectivity check.
    pub fn do_run_test(&self) -> Result<()> {
        Ok(())
    }

    /// Creates a session; the redirector announces it in a cookie.
    pub fn do_create_session(&self) -> Result<()> {
        let web = self.objects.web().ok_or(RedirectorError::Unsupported {
            service: Service::CreateSession,
            flavor: self.objects.flavor(),
        })?;
        if let Some(session) = web.request.session(true) {
            debug!(session_id = %session.id(), "Session ready");
        }
        Ok(())
    }

    pub fn do_get_version(&self) -> Result<()> {
        self.objects
            .body_writer()
            .write_body(VERSION)
            .map_err(RedirectorError::Write)
    }

    pub fn is_auto_session(&self) -> bool {
        self.objects.params().flag(AUTOSESSION_NAME_PARAM)
    }
}
