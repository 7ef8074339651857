//! Transport-agnostic wire parameters.
//!
//! A redirector request is a flat, ordered list of key/value pairs. Over HTTP
//! it travels in the query string; over a message queue it travels as message
//! properties. Protocol keys share the [`INTERNAL_PARAM_PREFIX`] so they never
//! collide with parameters supplied by the test author.

use crate::error::ProtocolError;
use crate::service::Service;
use url::form_urlencoded;

/// Prefix reserved for protocol parameters.
pub const INTERNAL_PARAM_PREFIX: &str = "Cactus_";

pub const SERVICE_NAME_PARAM: &str = "Cactus_Service";
pub const CLASS_NAME_PARAM: &str = "Cactus_TestClass";
pub const METHOD_NAME_PARAM: &str = "Cactus_TestMethod";
pub const AUTOSESSION_NAME_PARAM: &str = "Cactus_AutomaticSession";
pub const WRAPPED_CLASS_NAME_PARAM: &str = "Cactus_WrappedTestClass";

pub const URL_PROTOCOL_PARAM: &str = "Cactus_URL_Protocol";
pub const URL_SERVER_PARAM: &str = "Cactus_URL_Server";
pub const URL_PORT_PARAM: &str = "Cactus_URL_Port";
pub const URL_CONTEXT_PATH_PARAM: &str = "Cactus_URL_ContextPath";
pub const URL_SERVLET_PATH_PARAM: &str = "Cactus_URL_ServletPath";
pub const URL_PATH_INFO_PARAM: &str = "Cactus_URL_PathInfo";
pub const URL_QUERY_STRING_PARAM: &str = "Cactus_URL_QueryString";

/// Header (HTTP) or message property (queue) marking a redirector fault.
/// Its value is the fault kind.
pub const FAULT_HEADER: &str = "X-Cactus-Fault";

/// Cookie carrying the container session id.
pub const SESSION_COOKIE_NAME: &str = "JSESSIONID";

/// Context-scope attribute holding the last test result.
pub const TEST_RESULTS_ATTRIBUTE: &str = "ServletTestRedirector_TestResults";

/// Ordered multimap of wire parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireParams {
    entries: Vec<(String, String)>,
}

impl WireParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an `application/x-www-form-urlencoded` string (a query string
    /// without the leading `?`, or a form body).
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self {
            entries: form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Appends a value, keeping earlier values for the same key.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replaces every value of `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(k, _)| *k != name);
        self.entries.push((name, value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| k != name);
    }

    pub fn extend(&mut self, other: &WireParams) {
        self.entries.extend(other.entries.iter().cloned());
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parameters supplied by the test author, without protocol keys.
    pub fn user_params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter()
            .filter(|(k, _)| !k.starts_with(INTERNAL_PARAM_PREFIX))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encodes the parameters as a form-urlencoded string.
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.entries {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }

    /// Value of a required parameter. An empty value counts as absent.
    pub fn require(
        &self,
        name: &'static str,
        description: &'static str,
    ) -> Result<&str, ProtocolError> {
        self.get(name)
            .filter(|v| !v.is_empty())
            .ok_or(ProtocolError::MissingParameter { name, description })
    }

    /// Boolean flag; anything but a case-insensitive `true` reads as false.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    /// The requested service.
    pub fn service(&self) -> Result<Service, ProtocolError> {
        self.require(SERVICE_NAME_PARAM, "service name")?.parse()
    }
}

impl<'a> IntoIterator for &'a WireParams {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
