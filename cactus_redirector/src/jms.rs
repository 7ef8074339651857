//! Message-driven redirector entry point.
//!
//! Consumes an in-process queue. Message properties carry the same wire
//! parameters an HTTP redirector reads from the query string; the reply
//! carries the service output, or a fault property and the diagnostic text.

use crate::controller::TestController;
use crate::error::RedirectorError;
use crate::implicit::ImplicitObjects;
use crate::implicit::message::{MessageContext, MessageImplicitObjects, ReplyMessage};
use crate::resolver::ClassResolver;
use cactus_common::WireParams;
use cactus_common::message::{Message, MessageReceiver, QueuedMessage};
use cactus_common::wire::FAULT_HEADER;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct MessageRedirector {
    receiver: MessageReceiver,
    resolver: Arc<dyn ClassResolver>,
    context: Arc<MessageContext>,
}

/// Fault reply for a message exchange.
pub fn fault_message(err: &RedirectorError) -> Message {
    let mut properties = WireParams::new();
    properties.set(FAULT_HEADER, err.fault_kind());
    Message::new(properties, err.to_string())
}

impl MessageRedirector {
    pub fn new(
        receiver: MessageReceiver,
        resolver: Arc<dyn ClassResolver>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            receiver,
            resolver,
            context: Arc::new(MessageContext::new(destination)),
        }
    }

    pub fn context(&self) -> &Arc<MessageContext> {
        &self.context
    }

    /// Handles one message and produces its reply.
    pub async fn handle(&self, message: Message) -> Message {
        let reply = Arc::new(ReplyMessage::new());
        let objects = ImplicitObjects::MessageDriven(MessageImplicitObjects {
            message: Arc::new(message),
            context: self.context.clone(),
            reply: reply.clone(),
        });
        let controller = TestController::new(self.resolver.clone());
        match controller.handle_request(objects).await {
            Ok(service) => {
                debug!(service = %service, "Replying to message");
                reply.to_message()
            }
            Err(err) => fault_message(&err),
        }
    }

    async fn answer(&self, queued: QueuedMessage) {
        let reply = self.handle(queued.message.clone()).await;
        if queued.reply(reply).is_err() {
            warn!("Requester went away before the reply was sent");
        }
    }

    /// Consumes messages one at a time until the queue closes or `shutdown`
    /// is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(destination = %self.context.destination(), "Message redirector started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = self.receiver.recv() => match next {
                    Some(queued) => self.answer(queued).await,
                    None => break,
                },
            }
        }
        info!(destination = %self.context.destination(), "Message redirector stopped");
    }

    /// Runs the redirector in a background task.
    pub fn spawn(self) -> (JoinHandle<()>, CancellationToken) {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(self.run(shutdown.clone()));
        (handle, shutdown)
    }
}
