//! The outbound request a begin hook prepares.

use cactus_common::ServletUrl;
use cactus_common::wire::{AUTOSESSION_NAME_PARAM, INTERNAL_PARAM_PREFIX, WireParams};
use cactus_common::ProtocolError;

/// Where a user parameter travels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParamMethod {
    Get,
    #[default]
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuthentication {
    pub user: String,
    pub password: String,
}

/// Raw request body sent instead of form parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    pub content: String,
    pub content_type: String,
}

/// Request sent to a redirector.
///
/// User parameters, headers and cookies set here reach the server-side test
/// unchanged. Framework parameters (`Cactus_*`) are kept apart and never
/// mixed with user parameters.
#[derive(Debug, Clone)]
pub struct WebRequest {
    internal: WireParams,
    get_params: WireParams,
    post_params: WireParams,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    user_data: Option<UserData>,
    authentication: Option<BasicAuthentication>,
    automatic_session: bool,
    url: Option<ServletUrl>,
    redirector_name: Option<String>,
}

impl Default for WebRequest {
    fn default() -> Self {
        Self {
            internal: WireParams::new(),
            get_params: WireParams::new(),
            post_params: WireParams::new(),
            headers: Vec::new(),
            cookies: Vec::new(),
            user_data: None,
            authentication: None,
            automatic_session: true,
            url: None,
            redirector_name: None,
        }
    }
}

impl WebRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a POST parameter.
    pub fn add_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.add_parameter_with(name, value, ParamMethod::Post);
    }

    pub fn add_parameter_with(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        method: ParamMethod,
    ) {
        match method {
            ParamMethod::Get => self.get_params.append(name, value),
            ParamMethod::Post => self.post_params.append(name, value),
        }
    }

    pub fn get_parameter(&self, name: &str) -> Option<&str> {
        self.get_params.get(name)
    }

    pub fn post_parameter(&self, name: &str) -> Option<&str> {
        self.post_params.get(name)
    }

    pub fn get_parameters(&self) -> &WireParams {
        &self.get_params
    }

    pub fn post_parameters(&self) -> &WireParams {
        &self.post_params
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn add_cookie(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.push((name.into(), value.into()));
    }

    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    /// `Cookie` header value, `None` without cookies.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(n, v)| format!("{n}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Sends `content` as the request body.
    pub fn set_user_data(&mut self, content: impl Into<String>, content_type: impl Into<String>) {
        self.user_data = Some(UserData {
            content: content.into(),
            content_type: content_type.into(),
        });
    }

    pub fn user_data(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }

    pub fn set_authentication(&mut self, user: impl Into<String>, password: impl Into<String>) {
        self.authentication = Some(BasicAuthentication {
            user: user.into(),
            password: password.into(),
        });
    }

    pub fn authentication(&self) -> Option<&BasicAuthentication> {
        self.authentication.as_ref()
    }

    /// Whether the redirector creates a session before running the test.
    /// On by default.
    pub fn set_automatic_session(&mut self, automatic: bool) {
        self.automatic_session = automatic;
    }

    pub fn automatic_session(&self) -> bool {
        self.automatic_session
    }

    /// Simulates the URL the server-side test sees. The simulated query
    /// string is also added to the GET parameters.
    pub fn set_url(
        &mut self,
        server: Option<&str>,
        context_path: Option<&str>,
        servlet_path: Option<&str>,
        path_info: Option<&str>,
        query_string: Option<&str>,
    ) -> Result<(), ProtocolError> {
        let url = ServletUrl::new(server, context_path, servlet_path, path_info, query_string)?;
        self.set_servlet_url(url);
        Ok(())
    }

    pub fn set_servlet_url(&mut self, url: ServletUrl) {
        if let Some(query) = url.query_string() {
            for (name, value) in WireParams::from_query(query).iter() {
                self.get_params.append(name, value);
            }
        }
        self.url = Some(url);
    }

    pub fn url(&self) -> Option<&ServletUrl> {
        self.url.as_ref()
    }

    /// Sends this request to another redirector than the configured one.
    pub fn set_redirector_name(&mut self, name: impl Into<String>) {
        self.redirector_name = Some(name.into());
    }

    pub fn redirector_name(&self) -> Option<&str> {
        self.redirector_name.as_deref()
    }

    pub(crate) fn set_internal(&mut self, name: &'static str, value: impl Into<String>) {
        debug_assert!(name.starts_with(INTERNAL_PARAM_PREFIX));
        self.internal.set(name, value);
    }

    pub fn internal_parameter(&self, name: &str) -> Option<&str> {
        self.internal.get(name)
    }

    /// POST when any POST parameter or body is present, else GET.
    pub fn http_method(&self) -> &'static str {
        if self.user_data.is_some() || !self.post_params.is_empty() {
            "POST"
        } else {
            "GET"
        }
    }

    /// Parameters carried in the URL: framework parameters, the simulated
    /// URL pieces and the GET parameters.
    pub fn query_params(&self) -> WireParams {
        let mut params = self.internal.clone();
        params.set(
            AUTOSESSION_NAME_PARAM,
            if self.automatic_session { "true" } else { "false" },
        );
        if let Some(url) = &self.url {
            url.write_params(&mut params);
        }
        params.extend(&self.get_params);
        params
    }

    /// Every parameter in one set, for transports without a URL.
    pub fn wire_params(&self) -> WireParams {
        let mut params = self.query_params();
        params.extend(&self.post_params);
        params
    }

    /// A request carrying only what a follow-up exchange must repeat: the
    /// redirector override and the credentials.
    pub(crate) fn follow_up(&self) -> WebRequest {
        WebRequest {
            redirector_name: self.redirector_name.clone(),
            authentication: self.authentication.clone(),
            automatic_session: false,
            ..WebRequest::default()
        }
    }
}
