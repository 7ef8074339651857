use crate::wrapped::WrappedFailure;
use cactus_common::message::QueueError;
use cactus_common::{ParsingError, ProtocolError, TestFailure};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("URL parsing failed: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Parsing(#[from] ParsingError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Invalid configuration file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("Invalid setting [{name}] = [{value}]: {reason}")]
    Setting {
        name: String,
        value: String,
        reason: String,
    },

    /// A begin/end method with the wrong shape, or more than one for a test.
    #[error("{0}")]
    HookSignature(String),

    #[error("Method [{method}] failed: {failure}")]
    Hook { method: String, failure: TestFailure },

    /// The redirector answered with a fault instead of a service reply.
    #[error("Redirector fault [{kind}] (status {status}): {message}")]
    Redirector {
        status: u16,
        kind: String,
        message: String,
    },

    /// The test failed inside the container.
    #[error(transparent)]
    Wrapped(#[from] WrappedFailure),

    #[error("Failed to create a new HTTP session: {0}")]
    Session(String),

    #[error("Client version [{client}] does not match redirector version [{server}]")]
    VersionMismatch { client: String, server: String },
}

impl ClientError {
    /// True for errors a test runner reports as failures rather than errors:
    /// hook signature problems and server-side assertion failures.
    pub fn is_assertion(&self) -> bool {
        match self {
            ClientError::HookSignature(_) => true,
            ClientError::Wrapped(wrapped) => wrapped.is_assertion(),
            ClientError::Hook { failure, .. } => failure.is_assertion(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
