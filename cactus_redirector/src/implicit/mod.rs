//! Implicit objects: the container-managed objects a test needs but cannot
//! build itself.
//!
//! A redirector entry point wraps the objects of one inbound request into an
//! [`ImplicitObjects`] bundle. The bundle lives for that request only. Its
//! [`Inject`] implementation hands the objects to a test through the slot the
//! test exposes with [`TestCase::implicit_slot`]; a test exposing no slot, or
//! a slot of another flavour, is left untouched.

pub mod attributes;
pub mod ejb;
pub mod jsp;
pub mod message;
pub mod web;

use crate::test_case::TestCase;
use attributes::AttributeMap;
use cactus_common::{ProtocolError, WireParams};
use ejb::{EjbFields, EjbImplicitObjects};
use jsp::{JspFields, JspImplicitObjects};
use message::{MessageFields, MessageImplicitObjects};
use std::{fmt, io};
use thiserror::Error;
use web::{ServletFields, WebImplicitObjects};

/// Access to the wire parameters an inbound request carries.
pub trait WireRequest {
    fn wire_params(&self) -> &WireParams;
}

/// The context-wide attribute scope that outlives a single request.
pub trait ContextScope {
    fn scope(&self) -> &AttributeMap;
}

/// Where services write their textual output.
pub trait BodyWriter: Send + Sync {
    fn write_body(&self, text: &str) -> io::Result<()>;
}

#[derive(Error, Debug)]
pub enum InjectionError {
    #[error("Invalid simulated URL: {0}")]
    SimulatedUrl(#[source] ProtocolError),
}

/// Hands implicit objects to a test instance.
pub trait Inject {
    fn inject_into(&self, test: &mut dyn TestCase) -> Result<(), InjectionError>;
}

/// The injection target a test exposes, borrowed mutably for the duration of
/// the injection.
pub enum ImplicitSlot<'a> {
    Servlet(&'a mut ServletFields),
    Jsp(&'a mut JspFields),
    Ejb(&'a mut EjbFields),
    Message(&'a mut MessageFields),
}

/// Redirector flavour a bundle comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Servlet,
    Jsp,
    Ejb,
    MessageDriven,
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Flavor::Servlet => "servlet",
            Flavor::Jsp => "JSP",
            Flavor::Ejb => "EJB",
            Flavor::MessageDriven => "message-driven",
        })
    }
}

#[derive(Debug, Clone)]
pub enum ImplicitObjects {
    Web(WebImplicitObjects),
    Jsp(JspImplicitObjects),
    Ejb(EjbImplicitObjects),
    MessageDriven(MessageImplicitObjects),
}

impl ImplicitObjects {
    pub fn flavor(&self) -> Flavor {
        match self {
            ImplicitObjects::Web(_) => Flavor::Servlet,
            ImplicitObjects::Jsp(_) => Flavor::Jsp,
            ImplicitObjects::Ejb(_) => Flavor::Ejb,
            ImplicitObjects::MessageDriven(_) => Flavor::MessageDriven,
        }
    }

    /// The inbound request's wire parameters.
    pub fn params(&self) -> &WireParams {
        match self {
            ImplicitObjects::Web(web) => web.request.wire_params(),
            ImplicitObjects::Jsp(jsp) => jsp.web.request.wire_params(),
            ImplicitObjects::Ejb(ejb) => ejb.request.wire_params(),
            ImplicitObjects::MessageDriven(mdb) => mdb.message.wire_params(),
        }
    }

    /// Context scope holding the stored test result between exchanges.
    pub fn scope(&self) -> &AttributeMap {
        match self {
            ImplicitObjects::Web(web) => web.context.scope(),
            ImplicitObjects::Jsp(jsp) => jsp.web.context.scope(),
            ImplicitObjects::Ejb(ejb) => ejb.context.scope(),
            ImplicitObjects::MessageDriven(mdb) => mdb.context.scope(),
        }
    }

    pub fn body_writer(&self) -> &dyn BodyWriter {
        match self {
            ImplicitObjects::Web(web) => web.response.as_ref(),
            ImplicitObjects::Jsp(jsp) => jsp.web.response.as_ref(),
            ImplicitObjects::Ejb(ejb) => ejb.response.as_ref(),
            ImplicitObjects::MessageDriven(mdb) => mdb.reply.as_ref(),
        }
    }

    /// The servlet part of the bundle, for flavours that have one.
    pub fn web(&self) -> Option<&WebImplicitObjects> {
        match self {
            ImplicitObjects::Web(web) => Some(web),
            ImplicitObjects::Jsp(jsp) => Some(&jsp.web),
            _ => None,
        }
    }
}

impl Inject for ImplicitObjects {
    fn inject_into(&self, test: &mut dyn TestCase) -> Result<(), InjectionError> {
        match self {
            ImplicitObjects::Web(web) => web.inject_into(test),
            ImplicitObjects::Jsp(jsp) => jsp.inject_into(test),
            ImplicitObjects::Ejb(ejb) => ejb.inject_into(test),
            ImplicitObjects::MessageDriven(mdb) => mdb.inject_into(test),
        }
    }
}
