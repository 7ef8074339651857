//! Error types shared by both halves of the bridge

use thiserror::Error;

/// A malformed inbound request: the redirector cannot even decide what to do.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Missing {description} parameter [{name}] in request")]
    MissingParameter {
        /// Wire key that was absent.
        name: &'static str,
        /// Human-readable role of the parameter (e.g. "service name").
        description: &'static str,
    },

    #[error("Unknown service [{0}] in request")]
    UnknownService(String),

    #[error("Invalid value [{value}] for parameter [{name}]: {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },
}

impl ProtocolError {
    /// Name of the missing parameter, if this is a missing-parameter error.
    pub fn missing_parameter(&self) -> Option<&'static str> {
        match self {
            ProtocolError::MissingParameter { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Number of payload characters quoted in a [`ParsingError`].
pub const PARSING_SNIPPET_CHARS: usize = 100;

/// A Result Envelope payload that does not follow the wire format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Not a valid response. First {shown} characters of the response: [{snippet}]")]
pub struct ParsingError {
    shown: usize,
    snippet: String,
}

impl ParsingError {
    /// Builds the error from the offending payload, quoting at most
    /// [`PARSING_SNIPPET_CHARS`] characters of it.
    pub fn for_payload(payload: &str) -> Self {
        let snippet: String = payload.chars().take(PARSING_SNIPPET_CHARS).collect();
        Self {
            shown: snippet.chars().count(),
            snippet,
        }
    }

    /// The quoted part of the payload.
    pub fn snippet(&self) -> &str {
        &self.snippet
    }
}
