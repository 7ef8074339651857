//! # Cactus Common
//!
//! Protocol vocabulary shared by the two halves of the in-container test
//! bridge: the client that drives a test and the redirector that runs it
//! inside the container.
//!
//! * [`service::Service`] - the closed set of redirector services.
//! * [`wire`] - wire parameter names and the [`wire::WireParams`] multimap.
//! * [`servlet_url::ServletUrl`] - the simulated request URL.
//! * [`failure::TestFailure`] - what a test body or hook raises.
//! * [`result::WebTestResult`] and [`parser`] - the Result Envelope and its
//!   textual encoding.
//! * [`message`] - the in-process queue used by message-driven redirectors.

pub mod error;
pub mod failure;
pub mod message;
pub mod parser;
pub mod result;
pub mod service;
pub mod servlet_url;
pub mod state_machine;
pub mod wire;

pub use error::{ParsingError, ProtocolError};
pub use failure::{TestFailure, TestResult, fail};
pub use result::{FailureDetails, WebTestResult};
pub use service::Service;
pub use servlet_url::ServletUrl;
pub use wire::WireParams;

/// Framework version reported by the `GET_VERSION` service.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
