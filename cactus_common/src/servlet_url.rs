//! Simulated request URL.
//!
//! A test can pretend its request reached the container through a URL other
//! than the redirector's own. The client encodes the pieces as `Cactus_URL_*`
//! wire parameters; the server-side request wrapper answers URL queries from
//! them.

use crate::error::ProtocolError;
use crate::wire::{
    URL_CONTEXT_PATH_PARAM, URL_PATH_INFO_PARAM, URL_PORT_PARAM, URL_PROTOCOL_PARAM,
    URL_QUERY_STRING_PARAM, URL_SERVER_PARAM, URL_SERVLET_PATH_PARAM, WireParams,
};
use url::Host;

pub const PROTOCOL_HTTP: &str = "http";
pub const PROTOCOL_HTTPS: &str = "https";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServletUrl {
    protocol: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    context_path: Option<String>,
    servlet_path: Option<String>,
    path_info: Option<String>,
    query_string: Option<String>,
}

fn invalid(name: &str, value: &str, reason: impl Into<String>) -> ProtocolError {
    ProtocolError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn check_path(name: &str, value: &str, allow_empty: bool) -> Result<(), ProtocolError> {
    if (allow_empty && value.is_empty()) || value.starts_with('/') {
        Ok(())
    } else if allow_empty {
        Err(invalid(name, value, "must be empty or start with '/'"))
    } else {
        Err(invalid(name, value, "must start with '/'"))
    }
}

impl ServletUrl {
    /// Builds a simulated URL.
    ///
    /// `server` is `host` or `host:port`. Every piece is optional; pieces left
    /// out fall back to the real request on the server side.
    pub fn new(
        server: Option<&str>,
        context_path: Option<&str>,
        servlet_path: Option<&str>,
        path_info: Option<&str>,
        query_string: Option<&str>,
    ) -> Result<Self, ProtocolError> {
        let mut url = ServletUrl::default();
        if let Some(server) = server {
            url.set_server(server)?;
        }
        if let Some(path) = context_path {
            check_path(URL_CONTEXT_PATH_PARAM, path, true)?;
            url.context_path = Some(path.to_string());
        }
        if let Some(path) = servlet_path {
            check_path(URL_SERVLET_PATH_PARAM, path, true)?;
            url.servlet_path = Some(path.to_string());
        }
        if let Some(path) = path_info {
            check_path(URL_PATH_INFO_PARAM, path, false)?;
            url.path_info = Some(path.to_string());
        }
        url.query_string = query_string.map(|q| q.strip_prefix('?').unwrap_or(q).to_string());
        Ok(url)
    }

    pub fn with_protocol(mut self, protocol: &str) -> Result<Self, ProtocolError> {
        let lower = protocol.to_ascii_lowercase();
        if lower != PROTOCOL_HTTP && lower != PROTOCOL_HTTPS {
            return Err(invalid(
                URL_PROTOCOL_PARAM,
                protocol,
                "currently supported protocols are [http] and [https]",
            ));
        }
        self.protocol = Some(lower);
        Ok(self)
    }

    fn set_server(&mut self, server: &str) -> Result<(), ProtocolError> {
        // Bracketed IPv6 hosts carry colons of their own.
        let (host, port) = match server.find(']') {
            Some(end) if server.starts_with('[') => {
                let (host, tail) = server.split_at(end + 1);
                (host, tail.strip_prefix(':'))
            }
            _ => match server.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (server, None),
            },
        };
        let host =
            Host::parse(host).map_err(|e| invalid(URL_SERVER_PARAM, server, e.to_string()))?;
        if let Some(port) = port {
            self.port = Some(
                port.parse::<u16>()
                    .map_err(|_| invalid(URL_SERVER_PARAM, server, "port is not a number"))?,
            );
        }
        self.host = Some(host.to_string());
        Ok(())
    }

    pub fn protocol(&self) -> &str {
        self.protocol.as_deref().unwrap_or(PROTOCOL_HTTP)
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn context_path(&self) -> Option<&str> {
        self.context_path.as_deref()
    }

    pub fn servlet_path(&self) -> Option<&str> {
        self.servlet_path.as_deref()
    }

    pub fn path_info(&self) -> Option<&str> {
        self.path_info.as_deref()
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Context path + servlet path + path info.
    pub fn path(&self) -> String {
        [
            self.context_path(),
            self.servlet_path(),
            self.path_info(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Writes the simulated pieces into `params`.
    pub fn write_params(&self, params: &mut WireParams) {
        if let Some(protocol) = &self.protocol {
            params.set(URL_PROTOCOL_PARAM, protocol.as_str());
        }
        if let Some(host) = &self.host {
            params.set(URL_SERVER_PARAM, host.as_str());
        }
        if let Some(port) = self.port {
            params.set(URL_PORT_PARAM, port.to_string());
        }
        let paths = [
            (URL_CONTEXT_PATH_PARAM, &self.context_path),
            (URL_SERVLET_PATH_PARAM, &self.servlet_path),
            (URL_PATH_INFO_PARAM, &self.path_info),
            (URL_QUERY_STRING_PARAM, &self.query_string),
        ];
        for (name, value) in paths {
            if let Some(value) = value {
                params.set(name, value.as_str());
            }
        }
    }

    /// Reads a simulated URL back from wire parameters. `None` when the
    /// request carries no simulation at all.
    pub fn from_params(params: &WireParams) -> Result<Option<Self>, ProtocolError> {
        let keys = [
            URL_PROTOCOL_PARAM,
            URL_SERVER_PARAM,
            URL_PORT_PARAM,
            URL_CONTEXT_PATH_PARAM,
            URL_SERVLET_PATH_PARAM,
            URL_PATH_INFO_PARAM,
            URL_QUERY_STRING_PARAM,
        ];
        if !keys.iter().any(|k| params.contains(k)) {
            return Ok(None);
        }

        let mut url = ServletUrl::new(
            params.get(URL_SERVER_PARAM),
            params.get(URL_CONTEXT_PATH_PARAM),
            params.get(URL_SERVLET_PATH_PARAM),
            params.get(URL_PATH_INFO_PARAM),
            params.get(URL_QUERY_STRING_PARAM),
        )?;
        if let Some(port) = params.get(URL_PORT_PARAM) {
            url.port = Some(
                port.parse()
                    .map_err(|_| invalid(URL_PORT_PARAM, port, "port is not a number"))?,
            );
        }
        if let Some(protocol) = params.get(URL_PROTOCOL_PARAM) {
            url = url.with_protocol(protocol)?;
        }
        Ok(Some(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_port() {
        let url = ServletUrl::new(Some("jakarta.apache.org:8080"), None, None, None, None).unwrap();
        assert_eq!(url.host(), Some("jakarta.apache.org"));
        assert_eq!(url.port(), Some(8080));
        assert_eq!(url.protocol(), "http");
    }

    #[test]
    fn server_host_is_parsed_as_a_url_host() {
        let url = ServletUrl::new(Some("[::1]:8443"), None, None, None, None).unwrap();
        assert_eq!(url.host(), Some("[::1]"));
        assert_eq!(url.port(), Some(8443));

        let url = ServletUrl::new(Some("Jakarta.Apache.org"), None, None, None, None).unwrap();
        assert_eq!(url.host(), Some("jakarta.apache.org"));
        assert_eq!(url.port(), None);

        assert!(ServletUrl::new(Some(":8080"), None, None, None, None).is_err());
        assert!(ServletUrl::new(Some("[::1"), None, None, None, None).is_err());
        assert!(ServletUrl::new(Some("host:http"), None, None, None, None).is_err());
    }

    #[test]
    fn rejects_relative_context_path() {
        let err = ServletUrl::new(None, Some("mywebapp"), None, None, None).unwrap_err();
        assert!(err.to_string().contains("must be empty or start with '/'"));
    }

    #[test]
    fn rejects_empty_path_info() {
        assert!(ServletUrl::new(None, None, None, Some(""), None).is_err());
        assert!(ServletUrl::new(None, Some(""), Some(""), Some("/x"), None).is_ok());
    }

    #[test]
    fn rejects_unsupported_protocol() {
        let err = ServletUrl::default().with_protocol("ftp").unwrap_err();
        assert!(err.to_string().contains("[http] and [https]"));
    }

    #[test]
    fn path_concatenates_present_pieces() {
        let url = ServletUrl::new(None, Some("/app"), Some("/servlet"), Some("/info"), None).unwrap();
        assert_eq!(url.path(), "/app/servlet/info");
    }

    #[test]
    fn survives_a_trip_through_wire_params() {
        let url = ServletUrl::new(
            Some("localhost:9090"),
            Some("/ctx"),
            Some("/srv"),
            Some("/pi"),
            Some("?a=b"),
        )
        .unwrap()
        .with_protocol("HTTPS")
        .unwrap();
        let mut params = WireParams::new();
        url.write_params(&mut params);
        let back = ServletUrl::from_params(&params).unwrap().unwrap();
        assert_eq!(back, url);
        assert_eq!(back.query_string(), Some("a=b"));
        assert_eq!(back.protocol(), "https");
    }

    #[test]
    fn absent_simulation_reads_as_none() {
        let params = WireParams::from_query("a=b");
        assert!(ServletUrl::from_params(&params).unwrap().is_none());
    }
}
