//! Transports.
//!
//! A [`ConnectionHelper`] opens one exchange with a redirector. The reply it
//! returns is still streaming; [`Connection::drain`] reads it to the end and
//! releases the transport. Callers drain the first exchange of a test before
//! they open the second.

use crate::config::{ClientConfiguration, RedirectorKind};
use crate::error::Result;
use crate::request::WebRequest;
use async_trait::async_trait;
use bytes::Bytes;
use cactus_common::wire::FAULT_HEADER;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use tracing::debug;
use url::Url;

/// An open exchange whose body may not have been read yet.
#[async_trait]
pub trait Connection: Send {
    /// Where the request went.
    fn url(&self) -> &str;

    fn status(&self) -> u16;

    /// First value of a header, matched case-insensitively.
    fn header(&self, name: &str) -> Option<&str>;

    /// Reads the reply to the end and releases the transport.
    async fn drain(self: Box<Self>) -> Result<HttpConnection>;
}

/// Opens exchanges with a redirector.
#[async_trait]
pub trait ConnectionHelper: Send + Sync {
    async fn connect(
        &self,
        request: &WebRequest,
        config: &ClientConfiguration,
    ) -> Result<Box<dyn Connection>>;
}

/// A fully read reply: status, headers and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConnection {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpConnection {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Fault kind when the redirector answered with a fault.
    pub fn fault(&self) -> Option<&str> {
        self.header(FAULT_HEADER)
    }
}

/// HTTP transport built on `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpConnectionHelper {
    client: reqwest::Client,
    kind: RedirectorKind,
}

impl HttpConnectionHelper {
    pub fn new(config: &ClientConfiguration, kind: RedirectorKind) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, kind))
    }

    pub fn with_client(client: reqwest::Client, kind: RedirectorKind) -> Self {
        Self { client, kind }
    }

    pub fn kind(&self) -> RedirectorKind {
        self.kind
    }

    fn target_url(&self, request: &WebRequest, config: &ClientConfiguration) -> Result<Url> {
        let base = match request.redirector_name() {
            Some(name) => config.url_for(name),
            None => config.redirector_url(self.kind),
        };
        let mut url = Url::parse(&base)?;
        let params = request.query_params();
        if !params.is_empty() {
            url.set_query(Some(&params.to_query_string()));
        }
        Ok(url)
    }
}

#[async_trait]
impl ConnectionHelper for HttpConnectionHelper {
    async fn connect(
        &self,
        request: &WebRequest,
        config: &ClientConfiguration,
    ) -> Result<Box<dyn Connection>> {
        let url = self.target_url(request, config)?;
        let method = request.http_method();
        debug!(method, url = %url, "Connecting to redirector");

        let mut builder = match method {
            "POST" => self.client.post(url.clone()),
            _ => self.client.get(url.clone()),
        };
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookies) = request.cookie_header() {
            builder = builder.header(COOKIE, cookies);
        }
        if let Some(auth) = request.authentication() {
            builder = builder.basic_auth(&auth.user, Some(&auth.password));
        }
        if let Some(data) = request.user_data() {
            builder = builder
                .header(CONTENT_TYPE, data.content_type.as_str())
                .body(data.content.clone());
        } else if !request.post_parameters().is_empty() {
            builder = builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(request.post_parameters().to_query_string());
        }

        let response = builder.send().await?;
        Ok(Box::new(HttpResponseConnection {
            url: url.to_string(),
            response,
        }))
    }
}

struct HttpResponseConnection {
    url: String,
    response: reqwest::Response,
}

#[async_trait]
impl Connection for HttpResponseConnection {
    fn url(&self) -> &str {
        &self.url
    }

    fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
    }

    async fn drain(self: Box<Self>) -> Result<HttpConnection> {
        let this = *self;
        let status = this.response.status().as_u16();
        let headers = this
            .response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = this.response.bytes().await?;
        debug!(url = %this.url, status, bytes = body.len(), "Drained redirector reply");
        Ok(HttpConnection {
            url: this.url,
            status,
            headers,
            body,
        })
    }
}
