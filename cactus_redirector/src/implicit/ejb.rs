//! EJB-flavoured implicit objects: a typed request and the bean's session
//! context.

use super::attributes::AttributeMap;
use super::web::ServletResponse;
use super::{ContextScope, ImplicitSlot, Inject, InjectionError, WireRequest};
use crate::test_case::TestCase;
use cactus_common::WireParams;
use cactus_common::failure::TestFailure;
use cactus_common::wire::INTERNAL_PARAM_PREFIX;
use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

/// The request as an EJB test sees it.
#[derive(Debug, Clone)]
pub struct EjbRequest {
    params: WireParams,
    caller_principal: Option<String>,
}

impl EjbRequest {
    pub fn new(params: WireParams, caller_principal: Option<String>) -> Self {
        Self {
            params,
            caller_principal,
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        if name.starts_with(INTERNAL_PARAM_PREFIX) {
            return None;
        }
        self.params.get(name)
    }

    pub fn parameter_values(&self, name: &str) -> Vec<&str> {
        if name.starts_with(INTERNAL_PARAM_PREFIX) {
            return Vec::new();
        }
        self.params.get_all(name)
    }

    pub fn caller_principal(&self) -> Option<&str> {
        self.caller_principal.as_deref()
    }
}

impl WireRequest for EjbRequest {
    fn wire_params(&self) -> &WireParams {
        &self.params
    }
}

/// State of the redirector bean that outlives a request: its environment and
/// the attribute scope holding the stored result.
#[derive(Debug, Default)]
pub struct EjbBean {
    attributes: AttributeMap,
    environment: BTreeMap<String, String>,
}

impl EjbBean {
    pub fn new(environment: BTreeMap<String, String>) -> Self {
        Self {
            environment,
            ..Self::default()
        }
    }
}

/// Session context handed to one request. The rollback flag starts clear on
/// every request.
#[derive(Debug, Default)]
pub struct EjbContext {
    bean: Arc<EjbBean>,
    rollback_only: AtomicBool,
}

impl EjbContext {
    pub fn new(bean: Arc<EjbBean>) -> Self {
        Self {
            bean,
            rollback_only: AtomicBool::new(false),
        }
    }

    /// Environment entry configured for the bean.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.bean.environment.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.bean.attributes
    }

    pub fn set_rollback_only(&self) {
        self.rollback_only.store(true, Ordering::SeqCst);
    }

    pub fn rollback_only(&self) -> bool {
        self.rollback_only.load(Ordering::SeqCst)
    }
}

impl ContextScope for EjbContext {
    fn scope(&self) -> &AttributeMap {
        &self.bean.attributes
    }
}

#[derive(Debug, Clone, Default)]
pub struct EjbFields {
    pub request: Option<Arc<EjbRequest>>,
    pub context: Option<Arc<EjbContext>>,
}

impl EjbFields {
    pub fn request(&self) -> Result<&Arc<EjbRequest>, TestFailure> {
        self.request
            .as_ref()
            .ok_or_else(|| TestFailure::assertion("No EJB request was injected into this test"))
    }

    pub fn context(&self) -> Result<&Arc<EjbContext>, TestFailure> {
        self.context
            .as_ref()
            .ok_or_else(|| TestFailure::assertion("No EJB context was injected into this test"))
    }
}

/// Implicit objects of a request reaching the EJB redirector. The response
/// only carries service output; tests never see it.
#[derive(Debug, Clone)]
pub struct EjbImplicitObjects {
    pub request: Arc<EjbRequest>,
    pub context: Arc<EjbContext>,
    pub response: Arc<ServletResponse>,
}

impl Inject for EjbImplicitObjects {
    fn inject_into(&self, test: &mut dyn TestCase) -> Result<(), InjectionError> {
        if let Some(ImplicitSlot::Ejb(fields)) = test.implicit_slot() {
            fields.request = Some(self.request.clone());
            fields.context = Some(self.context.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_hides_protocol_parameters() {
        let request = EjbRequest::new(
            WireParams::from_query("Cactus_TestMethod=testX&amount=10"),
            Some("bob".to_string()),
        );
        assert_eq!(request.parameter("amount"), Some("10"));
        assert_eq!(request.parameter("Cactus_TestMethod"), None);
        assert_eq!(request.wire_params().get("Cactus_TestMethod"), Some("testX"));
        assert_eq!(request.caller_principal(), Some("bob"));
    }

    #[test]
    fn context_tracks_rollback_and_environment() {
        let bean = Arc::new(EjbBean::new(BTreeMap::from([(
            "rate".to_string(),
            "5".to_string(),
        )])));
        let context = EjbContext::new(bean.clone());
        assert_eq!(context.lookup("rate"), Some("5"));
        assert!(!context.rollback_only());
        context.set_rollback_only();
        assert!(context.rollback_only());

        context.attributes().set("seen", true);
        let next = EjbContext::new(bean);
        assert!(!next.rollback_only());
        assert!(next.attributes().get::<bool>("seen").is_some());
    }
}
