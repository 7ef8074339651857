//! The closed set of services a redirector answers.

use crate::error::ProtocolError;
use std::{fmt, str::FromStr};

/// Named operations carried in the `Cactus_Service` wire parameter.
///
/// The declaration order is the protocol order; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Service {
    /// Execute a test method inside the container and store its result.
    CallTest,
    /// Fetch the result stored by the preceding `CallTest`.
    GetResults,
    /// Connectivity check: succeeds if the round trip completes.
    RunTest,
    /// Create a container session and return its cookie.
    CreateSession,
    /// Return the framework version running in the container.
    GetVersion,
}

impl Service {
    pub const ALL: [Service; 5] = [
        Service::CallTest,
        Service::GetResults,
        Service::RunTest,
        Service::CreateSession,
        Service::GetVersion,
    ];

    /// Wire spelling of the service.
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::CallTest => "CALL_TEST",
            Service::GetResults => "GET_RESULTS",
            Service::RunTest => "RUN_TEST",
            Service::CreateSession => "CREATE_SESSION",
            Service::GetVersion => "GET_VERSION",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Service::ALL
            .into_iter()
            .find(|service| service.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownService(s.to_string()))
    }
}
