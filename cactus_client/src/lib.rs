//! # Cactus Client
//!
//! The client half of the in-container test bridge. A [`WebTestClient`]
//! asks a redirector to run a named test method inside the container, reads
//! whatever the test wrote back, then fetches the stored result on a second
//! exchange. [`ClientTestCaller`] wraps that exchange with the test class's
//! begin and end hooks.
//!
//! Two transports implement [`ConnectionHelper`]: HTTP through `reqwest`
//! ([`HttpConnectionHelper`]) and the in-process message queue
//! ([`QueueConnectionHelper`]).

pub mod caller;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod hooks;
pub mod queue;
pub mod request;
pub mod response;
pub mod wrapped;

pub use caller::ClientTestCaller;
pub use client::{TestTarget, WebTestClient};
pub use config::{ClientConfiguration, RedirectorKind};
pub use connection::{Connection, ConnectionHelper, HttpConnection, HttpConnectionHelper};
pub use error::{ClientError, Result};
pub use hooks::{HookTable, MethodSignature, Visibility};
pub use queue::QueueConnectionHelper;
pub use request::{ParamMethod, WebRequest};
pub use response::{ClientCookie, EndResponse, WebResponse};
pub use wrapped::WrappedFailure;
