//! # Cactus Redirector
//!
//! The server half of the in-container test bridge. A redirector receives a
//! request from the client half, runs the named test method inside the
//! container with the container's implicit objects injected, and keeps the
//! outcome until the client asks for it on a second exchange.
//!
//! Three HTTP entry points (servlet, JSP and EJB flavours) are served by
//! [`router`]; [`jms::MessageRedirector`] is the message-driven entry point
//! over an in-process queue.
//!
//! Test classes are registered with a [`TestRegistry`] and looked up through
//! a [`ChainedResolver`], which falls back to the framework's own wrapper
//! classes.

pub mod caller;
pub mod controller;
pub mod error;
pub mod implicit;
pub mod jms;
pub mod logging;
pub mod redirector;
pub mod resolver;
pub mod session;
pub mod test_case;
pub mod wrapper;

pub use controller::TestController;
pub use error::{RedirectorError, Result};
pub use implicit::{Flavor, ImplicitObjects, ImplicitSlot};
pub use jms::MessageRedirector;
pub use redirector::{
    RedirectorConfig, RedirectorHandle, router, spawn_redirector, start_redirector,
};
pub use resolver::{ChainedResolver, ClassLoadError, ClassResolver, TestRegistry};
pub use test_case::{Fixture, TestCase, TestClass, TestFactory};
