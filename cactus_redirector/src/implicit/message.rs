//! Message-driven implicit objects: the inbound message, the shared message
//! context and the reply under construction.

use super::attributes::AttributeMap;
use super::{BodyWriter, ContextScope, ImplicitSlot, Inject, InjectionError, WireRequest};
use crate::test_case::TestCase;
use cactus_common::WireParams;
use cactus_common::failure::TestFailure;
use cactus_common::message::Message;
use std::{
    io,
    sync::{Arc, Mutex, PoisonError},
};

impl WireRequest for Message {
    fn wire_params(&self) -> &WireParams {
        &self.properties
    }
}

/// Context of the message-driven redirector, shared by every message it
/// consumes.
#[derive(Debug, Default)]
pub struct MessageContext {
    destination: String,
    attributes: AttributeMap,
}

impl MessageContext {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            attributes: AttributeMap::new(),
        }
    }

    /// Name of the queue the redirector listens on.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }
}

impl ContextScope for MessageContext {
    fn scope(&self) -> &AttributeMap {
        &self.attributes
    }
}

/// Reply being built for the current message.
#[derive(Debug, Default)]
pub struct ReplyMessage {
    inner: Mutex<Message>,
}

impl ReplyMessage {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Message> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_property(&self, name: &str, value: &str) {
        self.inner().properties.set(name, value);
    }

    pub fn write(&self, text: &str) {
        self.inner().body.push_str(text);
    }

    pub fn to_message(&self) -> Message {
        self.inner().clone()
    }
}

impl BodyWriter for ReplyMessage {
    fn write_body(&self, text: &str) -> io::Result<()> {
        self.write(text);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageFields {
    pub message: Option<Arc<Message>>,
    pub context: Option<Arc<MessageContext>>,
    pub reply: Option<Arc<ReplyMessage>>,
}

impl MessageFields {
    pub fn message(&self) -> Result<&Arc<Message>, TestFailure> {
        self.message
            .as_ref()
            .ok_or_else(|| TestFailure::assertion("No message was injected into this test"))
    }

    pub fn context(&self) -> Result<&Arc<MessageContext>, TestFailure> {
        self.context
            .as_ref()
            .ok_or_else(|| TestFailure::assertion("No message context was injected into this test"))
    }

    pub fn reply(&self) -> Result<&Arc<ReplyMessage>, TestFailure> {
        self.reply
            .as_ref()
            .ok_or_else(|| TestFailure::assertion("No reply message was injected into this test"))
    }
}

#[derive(Debug, Clone)]
pub struct MessageImplicitObjects {
    pub message: Arc<Message>,
    pub context: Arc<MessageContext>,
    pub reply: Arc<ReplyMessage>,
}

impl Inject for MessageImplicitObjects {
    fn inject_into(&self, test: &mut dyn TestCase) -> Result<(), InjectionError> {
        if let Some(ImplicitSlot::Message(fields)) = test.implicit_slot() {
            fields.message = Some(self.message.clone());
            fields.context = Some(self.context.clone());
            fields.reply = Some(self.reply.clone());
        }
        Ok(())
    }
}
