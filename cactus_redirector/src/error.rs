//! Error types for the redirector

use crate::controller::remediation_message;
use crate::implicit::Flavor;
use cactus_common::{ProtocolError, Service};
use thiserror::Error;

/// Faults of one redirector exchange. Every variant is reported to the
/// client as a fault, never stored as a test result.
#[derive(Error, Debug)]
pub enum RedirectorError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("{}", remediation_message(.missing))]
    MissingLibrary { class_name: String, missing: String },

    #[error(
        "No test result found in the context scope: either no test was called, or its result was already fetched"
    )]
    NoTestResult,

    #[error("Error writing WebTestResult instance to output stream")]
    Write(#[source] std::io::Error),

    #[error("Service [{service}] is not supported by the {flavor} redirector")]
    Unsupported { service: Service, flavor: Flavor },

    #[error("Internal redirector error: {0}")]
    Internal(String),

    #[error("HTTP server error: {0}")]
    HttpServer(String),
}

impl RedirectorError {
    /// Value of the fault marker header / property.
    pub fn fault_kind(&self) -> &'static str {
        match self {
            RedirectorError::Protocol(_) => "protocol",
            RedirectorError::MissingLibrary { .. } => "missing-library",
            RedirectorError::NoTestResult => "no-result",
            RedirectorError::Write(_) => "io",
            RedirectorError::Unsupported { .. } => "unsupported",
            RedirectorError::Internal(_) | RedirectorError::HttpServer(_) => "internal",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            RedirectorError::Protocol(_) => 400,
            RedirectorError::Unsupported { .. } => 501,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, RedirectorError>;
