//! Service dispatch for one inbound request.

use crate::caller::TestCaller;
use crate::error::{RedirectorError, Result};
use crate::implicit::ImplicitObjects;
use crate::resolver::ClassResolver;
use cactus_common::Service;
use cactus_common::state_machine::StateMachine;
use std::sync::Arc;
use tracing::{debug, error};

/// Class-path prefix of the test framework library.
pub const FRAMEWORK_LIBRARY_PREFIX: &str = "junit/framework";

/// Remediation text for a class missing from the container class path.
pub fn remediation_message(missing: &str) -> String {
    if missing.starts_with(FRAMEWORK_LIBRARY_PREFIX) {
        "You must put the test framework library in your server classpath \
         (in WEB-INF/lib for example)"
            .to_string()
    } else {
        format!(
            "You are missing a jar in your classpath (class [{missing}] could not be found). \
             Put the jar in WEB-INF/lib"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerState {
    AwaitingService,
    Dispatched(Service),
    Faulted(String),
}

/// Parses the requested service and routes it to the [`TestCaller`].
pub struct TestController {
    resolver: Arc<dyn ClassResolver>,
    state: StateMachine<ControllerState>,
}

impl TestController {
    pub fn new(resolver: Arc<dyn ClassResolver>) -> Self {
        Self {
            resolver,
            state: StateMachine::new(ControllerState::AwaitingService),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state.current()
    }

    /// Handles one request. Returns the service that ran.
    pub async fn handle_request(&self, objects: ImplicitObjects) -> Result<Service> {
        let outcome = self.dispatch(objects).await;
        if let Err(err) = &outcome {
            error!(fault = err.fault_kind(), "{}", err);
            self.state
                .transition(|state| *state = ControllerState::Faulted(err.to_string()));
        }
        outcome
    }

    async fn dispatch(&self, objects: ImplicitObjects) -> Result<Service> {
        let service = objects.params().service()?;
        let accepted = self.state.transition(|state| match state {
            ControllerState::AwaitingService => {
                *state = ControllerState::Dispatched(service);
                true
            }
            _ => false,
        });
        if !accepted {
            return Err(RedirectorError::Internal(
                "A controller handles a single request".to_string(),
            ));
        }
        debug!(service = %service, flavor = %objects.flavor(), "Dispatching service");

        let caller = TestCaller::new(objects, self.resolver.clone());
        match service {
            Service::CallTest => caller.do_test().await?,
            Service::GetResults => caller.do_get_results()?,
            Service::RunTest => caller.do_run_test()?,
            Service::CreateSession => caller.do_create_session()?,
            Service::GetVersion => caller.do_get_version()?,
        }
        Ok(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caller::tests::sample_resolver;
    use crate::implicit::web::tests::web_objects;
    use cactus_common::ProtocolError;

    async fn handle(query: &str) -> (TestController, Result<Service>) {
        let controller = TestController::new(sample_resolver());
        let outcome = controller
            .handle_request(ImplicitObjects::Web(web_objects(query)))
            .await;
        (controller, outcome)
    }

    #[tokio::test]
    async fn dispatches_known_services() {
        let (controller, outcome) = handle("Cactus_Service=RUN_TEST").await;
        assert_eq!(outcome.unwrap(), Service::RunTest);
        assert_eq!(controller.state(), ControllerState::Dispatched(Service::RunTest));
    }

    #[tokio::test]
    async fn missing_service_faults() {
        let (controller, outcome) = handle("Cactus_TestClass=SampleTest").await;
        let err = outcome.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing service name parameter [Cactus_Service] in request"
        );
        assert!(matches!(controller.state(), ControllerState::Faulted(_)));
    }

    #[tokio::test]
    async fn unknown_service_faults_naming_the_value() {
        let (_, outcome) = handle("Cactus_Service=DANCE").await;
        assert!(matches!(
            outcome.unwrap_err(),
            RedirectorError::Protocol(ProtocolError::UnknownService(ref name)) if name == "DANCE"
        ));
    }

    #[tokio::test]
    async fn missing_library_faults_with_remediation() {
        let (controller, outcome) =
            handle("Cactus_Service=CALL_TEST&Cactus_TestClass=HttpUnitTest&Cactus_TestMethod=testX").await;
        let message = outcome.unwrap_err().to_string();
        assert_eq!(
            message,
            "You are missing a jar in your classpath (class [com/meterware/httpunit/WebResponse] \
             could not be found). Put the jar in WEB-INF/lib"
        );
        assert_eq!(controller.state(), ControllerState::Faulted(message));
    }

    #[tokio::test]
    async fn controllers_serve_one_request() {
        let controller = TestController::new(sample_resolver());
        controller
            .handle_request(ImplicitObjects::Web(web_objects("Cactus_Service=RUN_TEST")))
            .await
            .unwrap();
        let second = controller
            .handle_request(ImplicitObjects::Web(web_objects("Cactus_Service=RUN_TEST")))
            .await;
        assert!(matches!(second.unwrap_err(), RedirectorError::Internal(_)));
    }

    #[test]
    fn framework_classes_get_their_own_remediation() {
        assert_eq!(
            remediation_message("junit/framework/TestCase"),
            "You must put the test framework library in your server classpath (in WEB-INF/lib for example)"
        );
    }
}
