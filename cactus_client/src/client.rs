//! Exchanges with a redirector.
//!
//! A test run is two exchanges. The first (`CALL_TEST`) runs the test and
//! carries whatever the test wrote on its response; it is drained completely
//! before the second (`GET_RESULTS`) fetches the stored result.

use crate::config::{ClientConfiguration, RedirectorKind};
use crate::connection::{ConnectionHelper, HttpConnection, HttpConnectionHelper};
use crate::error::{ClientError, Result};
use crate::request::WebRequest;
use crate::response::ClientCookie;
use cactus_common::wire::{
    CLASS_NAME_PARAM, METHOD_NAME_PARAM, SERVICE_NAME_PARAM, SESSION_COOKIE_NAME,
    WRAPPED_CLASS_NAME_PARAM,
};
use cactus_common::{Service, VERSION, WebTestResult, parser};
use std::sync::Arc;
use tracing::{debug, info};

/// The server-side test a request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTarget {
    pub class_name: String,
    pub method_name: String,
    /// Set when a plain test runs inside a test wrapper class.
    pub wrapped_class_name: Option<String>,
}

impl TestTarget {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            wrapped_class_name: None,
        }
    }

    /// Runs `wrapped_class_name` inside the wrapper class `wrapper`.
    pub fn wrapped(
        wrapper: impl Into<String>,
        wrapped_class_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        Self {
            class_name: wrapper.into(),
            method_name: method_name.into(),
            wrapped_class_name: Some(wrapped_class_name.into()),
        }
    }
}

/// Client for one redirector.
#[derive(Clone)]
pub struct WebTestClient {
    config: ClientConfiguration,
    helper: Arc<dyn ConnectionHelper>,
}

impl std::fmt::Debug for WebTestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebTestClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WebTestClient {
    pub fn new(config: ClientConfiguration, helper: Arc<dyn ConnectionHelper>) -> Self {
        Self { config, helper }
    }

    /// HTTP client for one of the configured redirectors.
    pub fn http(config: ClientConfiguration, kind: RedirectorKind) -> Result<Self> {
        let helper = HttpConnectionHelper::new(&config, kind)?;
        Ok(Self::new(config, Arc::new(helper)))
    }

    pub fn config(&self) -> &ClientConfiguration {
        &self.config
    }

    /// One exchange, drained. Redirector faults become errors.
    async fn exchange(&self, request: &WebRequest) -> Result<HttpConnection> {
        let connection = self.helper.connect(request, &self.config).await?;
        let drained = connection.drain().await?;
        match drained.fault() {
            Some(kind) => Err(ClientError::Redirector {
                status: drained.status(),
                kind: kind.to_string(),
                message: drained.text(),
            }),
            None => Ok(drained),
        }
    }

    async fn service(&self, service: Service) -> Result<HttpConnection> {
        let mut request = WebRequest::new();
        request.set_automatic_session(false);
        request.set_internal(SERVICE_NAME_PARAM, service.as_str());
        self.exchange(&request).await
    }

    /// Runs the target test and fetches its result.
    ///
    /// Returns the test's own reply (the drained first exchange) together
    /// with the result envelope.
    pub async fn do_test(
        &self,
        request: &mut WebRequest,
        target: &TestTarget,
    ) -> Result<(HttpConnection, WebTestResult)> {
        request.set_internal(SERVICE_NAME_PARAM, Service::CallTest.as_str());
        request.set_internal(CLASS_NAME_PARAM, target.class_name.as_str());
        request.set_internal(METHOD_NAME_PARAM, target.method_name.as_str());
        if let Some(wrapped) = &target.wrapped_class_name {
            request.set_internal(WRAPPED_CLASS_NAME_PARAM, wrapped.as_str());
        }
        debug!(
            class_name = %target.class_name,
            method_name = %target.method_name,
            "Calling server-side test"
        );
        let reply = self.exchange(request).await?;
        let result = self.get_results(request).await?;
        Ok((reply, result))
    }

    /// Fetches the result of the last test run through this redirector.
    pub async fn get_results(&self, original: &WebRequest) -> Result<WebTestResult> {
        let mut request = original.follow_up();
        request.set_internal(SERVICE_NAME_PARAM, Service::GetResults.as_str());
        let reply = self.exchange(&request).await?;
        let result = parser::parse(&reply.text())?;
        debug!(result = %result, "Received test result");
        Ok(result)
    }

    /// Asks the redirector for a new session and returns its cookie.
    pub async fn create_session_cookie(&self) -> Result<ClientCookie> {
        let reply = self.service(Service::CreateSession).await?;
        reply
            .header_values("set-cookie")
            .into_iter()
            .filter_map(ClientCookie::parse)
            .find(|cookie| cookie.name.eq_ignore_ascii_case(SESSION_COOKIE_NAME))
            .ok_or_else(|| {
                ClientError::Session(format!(
                    "the response from [{}] carries no cookie named [{SESSION_COOKIE_NAME}]",
                    reply.url
                ))
            })
    }

    /// Framework version of the redirector.
    pub async fn get_version(&self) -> Result<String> {
        let reply = self.service(Service::GetVersion).await?;
        Ok(reply.text().trim().to_string())
    }

    /// Fails unless the redirector runs this framework version.
    pub async fn check_version(&self) -> Result<()> {
        let server = self.get_version().await?;
        if server != VERSION {
            return Err(ClientError::VersionMismatch {
                client: VERSION.to_string(),
                server,
            });
        }
        Ok(())
    }

    /// Round trip without running anything.
    pub async fn check_connection(&self) -> Result<()> {
        self.service(Service::RunTest).await?;
        info!(context_url = %self.config.context_url, "Redirector is reachable");
        Ok(())
    }
}
