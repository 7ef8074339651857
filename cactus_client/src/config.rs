//! Client configuration.
//!
//! Sources, later overriding earlier:
//!
//! 1. built-in defaults,
//! 2. the TOML file named by `CACTUS_CONFIG`,
//! 3. the `CACTUS_*` environment variables.

use crate::error::{ClientError, Result};
use serde::Deserialize;
use std::{path::Path, time::Duration};
use tracing::debug;
use url::Url;

pub const CONFIG_FILE_ENV: &str = "CACTUS_CONFIG";
pub const CONTEXT_URL_ENV: &str = "CACTUS_CONTEXT_URL";
pub const SERVLET_REDIRECTOR_NAME_ENV: &str = "CACTUS_SERVLET_REDIRECTOR_NAME";
pub const JSP_REDIRECTOR_NAME_ENV: &str = "CACTUS_JSP_REDIRECTOR_NAME";
pub const EJB_REDIRECTOR_NAME_ENV: &str = "CACTUS_EJB_REDIRECTOR_NAME";
pub const REQUEST_TIMEOUT_ENV: &str = "CACTUS_REQUEST_TIMEOUT_SECS";

/// Which redirector entry point a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectorKind {
    Servlet,
    Jsp,
    Ejb,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfiguration {
    /// URL of the web application, e.g. `http://localhost:8080/test`.
    pub context_url: String,
    pub servlet_redirector_name: String,
    pub jsp_redirector_name: String,
    pub ejb_redirector_name: String,
    pub request_timeout: Duration,
}

impl Default for ClientConfiguration {
    fn default() -> Self {
        Self {
            context_url: "http://localhost:8080/test".to_string(),
            servlet_redirector_name: "ServletRedirector".to_string(),
            jsp_redirector_name: "JspRedirector".to_string(),
            ejb_redirector_name: "EjbRedirector".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    context_url: Option<String>,
    servlet_redirector_name: Option<String>,
    jsp_redirector_name: Option<String>,
    ejb_redirector_name: Option<String>,
    request_timeout_secs: Option<u64>,
}

impl ClientConfiguration {
    /// Loads from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_sources(|name| std::env::var(name).ok())
    }

    /// Loads with `env` standing in for the process environment.
    pub fn from_sources(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = env(CONFIG_FILE_ENV) {
            debug!(path = %path, "Reading client configuration file");
            config.apply_toml(&std::fs::read_to_string(Path::new(&path))?)?;
        }
        config.apply_env(&env)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by one TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.apply_toml(&std::fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_context_url(mut self, context_url: impl Into<String>) -> Self {
        self.context_url = context_url.into();
        self
    }

    fn apply_toml(&mut self, text: &str) -> Result<()> {
        let file: ConfigFile = toml::from_str(text)?;
        if let Some(url) = file.context_url {
            self.context_url = url;
        }
        if let Some(name) = file.servlet_redirector_name {
            self.servlet_redirector_name = name;
        }
        if let Some(name) = file.jsp_redirector_name {
            self.jsp_redirector_name = name;
        }
        if let Some(name) = file.ejb_redirector_name {
            self.ejb_redirector_name = name;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        Ok(())
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = env(CONTEXT_URL_ENV) {
            self.context_url = url;
        }
        if let Some(name) = env(SERVLET_REDIRECTOR_NAME_ENV) {
            self.servlet_redirector_name = name;
        }
        if let Some(name) = env(JSP_REDIRECTOR_NAME_ENV) {
            self.jsp_redirector_name = name;
        }
        if let Some(name) = env(EJB_REDIRECTOR_NAME_ENV) {
            self.ejb_redirector_name = name;
        }
        if let Some(secs) = env(REQUEST_TIMEOUT_ENV) {
            let parsed = secs.trim().parse().map_err(|_| ClientError::Setting {
                name: REQUEST_TIMEOUT_ENV.to_string(),
                value: secs.clone(),
                reason: "expected a whole number of seconds".to_string(),
            })?;
            self.request_timeout = Duration::from_secs(parsed);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.context_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Setting {
                name: "context_url".to_string(),
                value: self.context_url.clone(),
                reason: "only http and https are supported".to_string(),
            });
        }
        Ok(())
    }

    pub fn redirector_name(&self, kind: RedirectorKind) -> &str {
        match kind {
            RedirectorKind::Servlet => &self.servlet_redirector_name,
            RedirectorKind::Jsp => &self.jsp_redirector_name,
            RedirectorKind::Ejb => &self.ejb_redirector_name,
        }
    }

    /// Context URL joined with a redirector name.
    pub fn url_for(&self, redirector_name: &str) -> String {
        format!(
            "{}/{}",
            self.context_url.trim_end_matches('/'),
            redirector_name.trim_start_matches('/')
        )
    }

    pub fn redirector_url(&self, kind: RedirectorKind) -> String {
        self.url_for(self.redirector_name(kind))
    }
}
