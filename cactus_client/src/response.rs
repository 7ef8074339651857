//! Response objects handed to end hooks.

use crate::connection::HttpConnection;
use crate::error::{ClientError, Result};
use crate::request::WebRequest;

/// Type name of the [`WebResponse`] end-hook parameter.
pub const WEB_RESPONSE_TYPE: &str = "WebResponse";
/// Type name of the raw [`HttpConnection`] end-hook parameter.
pub const HTTP_CONNECTION_TYPE: &str = "HttpConnection";

/// A cookie sent back by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
}

impl ClientCookie {
    /// Parses one `Set-Cookie` header value.
    pub fn parse(header: &str) -> Option<Self> {
        let mut pieces = header.split(';');
        let (name, value) = pieces.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let mut cookie = ClientCookie {
            name: name.to_string(),
            value: value.trim().trim_matches('"').to_string(),
            domain: None,
            path: None,
        };
        for attribute in pieces {
            if let Some((key, value)) = attribute.split_once('=') {
                let value = Some(value.trim().to_string());
                match key.trim().to_ascii_lowercase().as_str() {
                    "domain" => cookie.domain = value,
                    "path" => cookie.path = value,
                    _ => {}
                }
            }
        }
        Some(cookie)
    }
}

/// The reply to the test's own exchange, with the request that produced it.
#[derive(Debug, Clone)]
pub struct WebResponse {
    connection: HttpConnection,
    request: WebRequest,
}

impl WebResponse {
    pub fn new(connection: HttpConnection, request: WebRequest) -> Self {
        Self {
            connection,
            request,
        }
    }

    pub fn status(&self) -> u16 {
        self.connection.status()
    }

    pub fn text(&self) -> String {
        self.connection.text()
    }

    /// Body split into lines, without line terminators.
    pub fn text_as_lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.connection.header(name)
    }

    pub fn cookies(&self) -> Vec<ClientCookie> {
        self.connection
            .header_values("set-cookie")
            .into_iter()
            .filter_map(ClientCookie::parse)
            .collect()
    }

    /// Cookie by name, matched case-insensitively.
    pub fn cookie(&self, name: &str) -> Option<ClientCookie> {
        self.cookies()
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn request(&self) -> &WebRequest {
        &self.request
    }

    pub fn connection(&self) -> &HttpConnection {
        &self.connection
    }
}

/// What an end hook receives, by its declared parameter type.
#[derive(Debug, Clone)]
pub enum EndResponse {
    Web(WebResponse),
    Connection(HttpConnection),
}

impl EndResponse {
    pub fn type_name(&self) -> &'static str {
        match self {
            EndResponse::Web(_) => WEB_RESPONSE_TYPE,
            EndResponse::Connection(_) => HTTP_CONNECTION_TYPE,
        }
    }
}

/// Builds the response an end hook asked for.
pub struct ResponseFactory;

impl ResponseFactory {
    pub fn supports(type_name: &str) -> bool {
        matches!(type_name, WEB_RESPONSE_TYPE | HTTP_CONNECTION_TYPE)
    }

    pub fn create(
        method_name: &str,
        type_name: &str,
        connection: &HttpConnection,
        request: &WebRequest,
    ) -> Result<EndResponse> {
        match type_name {
            WEB_RESPONSE_TYPE => Ok(EndResponse::Web(WebResponse::new(
                connection.clone(),
                request.clone(),
            ))),
            HTTP_CONNECTION_TYPE => Ok(EndResponse::Connection(connection.clone())),
            other => Err(ClientError::HookSignature(format!(
                "The end method [{method_name}] has a bad parameter of type [{other}]"
            ))),
        }
    }
}
