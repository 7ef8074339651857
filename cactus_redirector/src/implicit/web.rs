//! Servlet-flavoured implicit objects: request, response, config and context.

use super::attributes::AttributeMap;
use super::{BodyWriter, ContextScope, ImplicitSlot, Inject, InjectionError, WireRequest};
use crate::session::{HttpSession, SessionStore};
use crate::test_case::TestCase;
use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use cactus_common::failure::TestFailure;
use cactus_common::servlet_url::{PROTOCOL_HTTPS, ServletUrl};
use cactus_common::wire::{AUTOSESSION_NAME_PARAM, INTERNAL_PARAM_PREFIX, SESSION_COOKIE_NAME};
use cactus_common::{VERSION, WireParams};
use std::{
    borrow::Cow,
    collections::BTreeMap,
    io,
    ops::Deref,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, info};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// What the container knows about an inbound request before the test sees it.
#[derive(Debug, Clone)]
pub struct RequestParts {
    pub method: String,
    pub scheme: String,
    pub server_name: String,
    pub server_port: u16,
    pub context_path: String,
    pub servlet_path: String,
    pub query_string: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RequestParts {
    pub fn new(method: impl Into<String>, query_string: Option<&str>) -> Self {
        Self {
            method: method.into(),
            scheme: "http".to_string(),
            server_name: "localhost".to_string(),
            server_port: 80,
            context_path: String::new(),
            servlet_path: String::new(),
            query_string: query_string.filter(|q| !q.is_empty()).map(str::to_string),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn at(mut self, context_path: &str, servlet_path: &str) -> Self {
        self.context_path = context_path.to_string();
        self.servlet_path = servlet_path.to_string();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Debug, Default)]
struct SessionState {
    current: Option<Arc<HttpSession>>,
    /// Id of a session this request created, to be announced in a cookie.
    created: Option<String>,
}

/// The container request.
///
/// Query and form parameters are merged into one parameter view; protocol
/// parameters are hidden from it but stay available through
/// [`ServletRequest::wire_params`].
#[derive(Debug)]
pub struct ServletRequest {
    method: String,
    scheme: String,
    server_name: String,
    server_port: u16,
    context_path: String,
    servlet_path: String,
    query_string: Option<String>,
    headers: Vec<(String, String)>,
    body: Bytes,
    params: WireParams,
    cookies: Vec<(String, String)>,
    attributes: AttributeMap,
    sessions: Arc<SessionStore>,
    session: Mutex<SessionState>,
}

fn parse_cookie_header(value: &str) -> impl Iterator<Item = (String, String)> + '_ {
    value.split(';').filter_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        (!name.is_empty()).then(|| (name.to_string(), value.trim().trim_matches('"').to_string()))
    })
}

impl ServletRequest {
    pub fn new(parts: RequestParts, sessions: Arc<SessionStore>) -> Self {
        let mut params = parts
            .query_string
            .as_deref()
            .map(WireParams::from_query)
            .unwrap_or_default();

        let is_form = parts.headers.iter().any(|(k, v)| {
            k.eq_ignore_ascii_case("content-type") && v.starts_with(FORM_CONTENT_TYPE)
        });
        if is_form && !parts.body.is_empty() {
            params.extend(&WireParams::from_query(&String::from_utf8_lossy(&parts.body)));
        }

        let cookies = parts
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("cookie"))
            .flat_map(|(_, v)| parse_cookie_header(v))
            .collect();

        Self {
            method: parts.method,
            scheme: parts.scheme,
            server_name: parts.server_name,
            server_port: parts.server_port,
            context_path: parts.context_path,
            servlet_path: parts.servlet_path,
            query_string: parts.query_string,
            headers: parts.headers,
            body: parts.body,
            params,
            cookies,
            attributes: AttributeMap::new(),
            sessions,
            session: Mutex::new(SessionState::default()),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Every parameter, protocol keys included.
    pub fn wire_params(&self) -> &WireParams {
        &self.params
    }

    /// First value of a user parameter.
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

    /// Names of user parameters, in first-seen order.
    pub fn parameter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (name, _) in self.params.user_params() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// First value of a header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// `BASIC` when the request carries HTTP Basic credentials.
    pub fn auth_type(&self) -> Option<&'static str> {
        self.basic_credentials().map(|_| "BASIC")
    }

    /// User name from HTTP Basic credentials.
    pub fn remote_user(&self) -> Option<String> {
        self.basic_credentials().map(|(user, _)| user)
    }

    fn basic_credentials(&self) -> Option<(String, String)> {
        let value = self.header("authorization")?;
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, password) = decoded.split_once(':')?;
        Some((user.to_string(), password.to_string()))
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn requested_session_id(&self) -> Option<&str> {
        self.cookie(SESSION_COOKIE_NAME)
    }

    /// The request's session, joining the one named by the session cookie.
    /// With `create`, a new session is made when none can be joined.
    pub fn session(&self, create: bool) -> Option<Arc<HttpSession>> {
        let mut state = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = state.current.as_ref().filter(|s| !s.is_invalidated()) {
            return Some(current.clone());
        }
        if let Some(joined) = self.requested_session_id().and_then(|id| self.sessions.join(id)) {
            state.current = Some(joined.clone());
            return Some(joined);
        }
        if !create {
            return None;
        }
        let session = self.sessions.create();
        state.created = Some(session.id().to_string());
        state.current = Some(session.clone());
        Some(session)
    }

    /// Id of the session created while serving this request, if any.
    pub fn created_session_id(&self) -> Option<String> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .created
            .clone()
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    pub fn servlet_path(&self) -> &str {
        &self.servlet_path
    }

    pub fn path_info(&self) -> Option<&str> {
        None
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    pub fn request_uri(&self) -> String {
        format!("{}{}", self.context_path, self.servlet_path)
    }
}

impl WireRequest for ServletRequest {
    fn wire_params(&self) -> &WireParams {
        &self.params
    }
}

/// The request a test sees: URL queries are answered from the simulated URL
/// when the client sent one, everything else comes from the container
/// request.
#[derive(Debug)]
pub struct RequestWrapper {
    inner: Arc<ServletRequest>,
    url: Option<ServletUrl>,
}

impl RequestWrapper {
    pub fn new(inner: Arc<ServletRequest>, url: Option<ServletUrl>) -> Self {
        Self { inner, url }
    }

    pub fn simulated_url(&self) -> Option<&ServletUrl> {
        self.url.as_ref()
    }

    pub fn original(&self) -> &Arc<ServletRequest> {
        &self.inner
    }

    pub fn scheme(&self) -> &str {
        match &self.url {
            Some(url) => url.protocol(),
            None => self.inner.scheme(),
        }
    }

    pub fn server_name(&self) -> &str {
        self.url
            .as_ref()
            .and_then(ServletUrl::host)
            .unwrap_or_else(|| self.inner.server_name())
    }

    /// Simulated port; the protocol's default port when only a simulated host
    /// was given.
    pub fn server_port(&self) -> u16 {
        match &self.url {
            Some(url) if url.port().is_some() => url.port().unwrap_or_default(),
            Some(url) if url.host().is_some() => {
                if url.protocol() == PROTOCOL_HTTPS {
                    443
                } else {
                    80
                }
            }
            _ => self.inner.server_port(),
        }
    }

    pub fn context_path(&self) -> &str {
        self.url
            .as_ref()
            .and_then(ServletUrl::context_path)
            .unwrap_or_else(|| self.inner.context_path())
    }

    pub fn servlet_path(&self) -> &str {
        self.url
            .as_ref()
            .and_then(ServletUrl::servlet_path)
            .unwrap_or_else(|| self.inner.servlet_path())
    }

    /// With a simulated URL, its path info (possibly none).
    pub fn path_info(&self) -> Option<&str> {
        match &self.url {
            Some(url) => url.path_info(),
            None => self.inner.path_info(),
        }
    }

    /// With a simulated URL, its query string (possibly none).
    pub fn query_string(&self) -> Option<&str> {
        match &self.url {
            Some(url) => url.query_string(),
            None => self.inner.query_string(),
        }
    }

    pub fn request_uri(&self) -> String {
        format!(
            "{}{}{}",
            self.context_path(),
            self.servlet_path(),
            self.path_info().unwrap_or_default()
        )
    }
}

impl Deref for RequestWrapper {
    type Target = ServletRequest;

    fn deref(&self) -> &ServletRequest {
        &self.inner
    }
}

/// A cookie set by the test on its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub max_age: Option<i64>,
}

impl ResponseCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            max_age: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        let mut value = format!("{}={}", self.name, self.value);
        if let Some(path) = &self.path {
            value.push_str("; Path=");
            value.push_str(path);
        }
        if let Some(max_age) = self.max_age {
            value.push_str(&format!("; Max-Age={max_age}"));
        }
        value
    }
}

/// Everything the test put on its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseParts {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<ResponseCookie>,
    pub body: Bytes,
}

#[derive(Debug)]
struct ResponseState {
    status: u16,
    headers: Vec<(String, String)>,
    cookies: Vec<ResponseCookie>,
    body: Vec<u8>,
    closed: bool,
}

/// The container response. Shared between the test, its page writer and the
/// redirector, which turns it into the HTTP reply of the `CALL_TEST` exchange.
#[derive(Debug)]
pub struct ServletResponse {
    state: Mutex<ResponseState>,
}

impl Default for ServletResponse {
    fn default() -> Self {
        Self {
            state: Mutex::new(ResponseState {
                status: 200,
                headers: Vec::new(),
                cookies: Vec::new(),
                body: Vec::new(),
                closed: false,
            }),
        }
    }
}

impl ServletResponse {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ResponseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> u16 {
        self.state().status
    }

    pub fn set_status(&self, status: u16) {
        self.state().status = status;
    }

    /// Replaces every value of the header.
    pub fn set_header(&self, name: &str, value: &str) {
        let mut state = self.state();
        state.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        state.headers.push((name.to_string(), value.to_string()));
    }

    pub fn add_header(&self, name: &str, value: &str) {
        self.state()
            .headers
            .push((name.to_string(), value.to_string()));
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.state()
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    pub fn set_content_type(&self, content_type: &str) {
        self.set_header("Content-Type", content_type);
    }

    pub fn add_cookie(&self, cookie: ResponseCookie) {
        self.state().cookies.push(cookie);
    }

    pub fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.state();
        if state.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "response output stream is closed",
            ));
        }
        state.body.extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_str(&self, text: &str) -> io::Result<()> {
        self.write(text.as_bytes())
    }

    /// Closes the output stream; later writes fail.
    pub fn close(&self) {
        self.state().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn parts(&self) -> ResponseParts {
        let state = self.state();
        ResponseParts {
            status: state.status,
            headers: state.headers.clone(),
            cookies: state.cookies.clone(),
            body: Bytes::copy_from_slice(&state.body),
        }
    }
}

impl BodyWriter for ServletResponse {
    fn write_body(&self, text: &str) -> io::Result<()> {
        self.write_str(text)
    }
}

/// Application scope shared by every request reaching one redirector.
#[derive(Debug)]
pub struct ServletContext {
    context_path: String,
    attributes: AttributeMap,
}

impl ServletContext {
    pub fn new(context_path: impl Into<String>) -> Self {
        Self {
            context_path: context_path.into(),
            attributes: AttributeMap::new(),
        }
    }

    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    pub fn server_info(&self) -> String {
        format!("cactus_redirector/{VERSION}")
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn log(&self, message: &str) {
        info!(context_path = %self.context_path, "{}", message);
    }
}

impl ContextScope for ServletContext {
    fn scope(&self) -> &AttributeMap {
        &self.attributes
    }
}

/// Per-request copy of the redirector's init parameters. A test may override
/// parameters without affecting other requests.
#[derive(Debug)]
pub struct ServletConfig {
    servlet_name: String,
    init_parameters: Mutex<BTreeMap<String, String>>,
    context: Arc<ServletContext>,
}

impl ServletConfig {
    pub fn new(
        servlet_name: impl Into<String>,
        init_parameters: BTreeMap<String, String>,
        context: Arc<ServletContext>,
    ) -> Self {
        Self {
            servlet_name: servlet_name.into(),
            init_parameters: Mutex::new(init_parameters),
            context,
        }
    }

    pub fn servlet_name(&self) -> &str {
        &self.servlet_name
    }

    pub fn init_parameter(&self, name: &str) -> Option<String> {
        self.init_parameters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn init_parameter_names(&self) -> Vec<String> {
        self.init_parameters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn set_init_parameter(&self, name: impl Into<String>, value: impl Into<String>) {
        self.init_parameters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into());
    }

    pub fn servlet_context(&self) -> &Arc<ServletContext> {
        &self.context
    }
}

/// Slots a servlet test exposes for injection.
#[derive(Debug, Clone, Default)]
pub struct ServletFields {
    pub request: Option<Arc<RequestWrapper>>,
    pub response: Option<Arc<ServletResponse>>,
    pub config: Option<Arc<ServletConfig>>,
    pub session: Option<Arc<HttpSession>>,
}

fn not_injected(what: &str) -> TestFailure {
    TestFailure::assertion(format!("No {what} was injected into this test"))
}

impl ServletFields {
    pub fn request(&self) -> Result<&Arc<RequestWrapper>, TestFailure> {
        self.request.as_ref().ok_or_else(|| not_injected("request"))
    }

    pub fn response(&self) -> Result<&Arc<ServletResponse>, TestFailure> {
        self.response.as_ref().ok_or_else(|| not_injected("response"))
    }

    pub fn config(&self) -> Result<&Arc<ServletConfig>, TestFailure> {
        self.config.as_ref().ok_or_else(|| not_injected("servlet config"))
    }

    pub fn session(&self) -> Result<&Arc<HttpSession>, TestFailure> {
        self.session.as_ref().ok_or_else(|| not_injected("session"))
    }
}

/// Implicit objects of a request reaching the servlet redirector.
#[derive(Debug, Clone)]
pub struct WebImplicitObjects {
    pub request: Arc<ServletRequest>,
    pub response: Arc<ServletResponse>,
    pub config: Arc<ServletConfig>,
    pub context: Arc<ServletContext>,
}

impl WebImplicitObjects {
    /// Fills servlet fields and returns the request wrapper the test sees.
    pub(crate) fn fill(
        &self,
        fields: &mut ServletFields,
    ) -> Result<Arc<RequestWrapper>, InjectionError> {
        let url = ServletUrl::from_params(self.request.wire_params())
            .map_err(InjectionError::SimulatedUrl)?;
        let request = Arc::new(RequestWrapper::new(self.request.clone(), url));
        fields.request = Some(request.clone());
        fields.response = Some(self.response.clone());
        fields.config = Some(self.config.clone());
        if self.request.wire_params().flag(AUTOSESSION_NAME_PARAM) {
            fields.session = self.request.session(true);
            debug!(
                session_id = fields.session.as_ref().map(|s| s.id()).unwrap_or_default(),
                "Attached automatic session"
            );
        }
        Ok(request)
    }
}

impl Inject for WebImplicitObjects {
    fn inject_into(&self, test: &mut dyn TestCase) -> Result<(), InjectionError> {
        match test.implicit_slot() {
            Some(ImplicitSlot::Servlet(fields)) => self.fill(fields).map(|_| ()),
            Some(ImplicitSlot::Jsp(fields)) => self.fill(&mut fields.servlet).map(|_| ()),
            _ => Ok(()),
        }
    }
}
