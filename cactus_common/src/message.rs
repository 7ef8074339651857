//! In-process message queue carrying redirector requests.
//!
//! A message-driven redirector receives the same wire parameters as an HTTP
//! redirector, but as message properties. Each queued message carries a
//! one-shot reply channel; the reply body holds whatever the service writes.

use crate::wire::{FAULT_HEADER, WireParams};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub properties: WireParams,
    pub body: String,
}

impl Message {
    pub fn new(properties: WireParams, body: impl Into<String>) -> Self {
        Self {
            properties,
            body: body.into(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name)
    }

    /// Fault kind, when this is a fault reply.
    pub fn fault(&self) -> Option<&str> {
        self.property(FAULT_HEADER)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Message queue is closed")]
    Closed,
    #[error("No reply received: the message redirector dropped the request")]
    NoReply,
}

/// A request taken off the queue, with its reply channel.
#[derive(Debug)]
pub struct QueuedMessage {
    pub message: Message,
    reply_to: oneshot::Sender<Message>,
}

impl QueuedMessage {
    /// Sends the reply. Returns the reply back if the requester went away.
    pub fn reply(self, reply: Message) -> Result<(), Message> {
        self.reply_to.send(reply)
    }
}

/// Sending half, held by clients.
#[derive(Debug, Clone)]
pub struct MessageSender {
    tx: mpsc::Sender<QueuedMessage>,
}

impl MessageSender {
    /// Sends a request and waits for its reply.
    pub async fn request(&self, message: Message) -> Result<Message, QueueError> {
        let (reply_to, reply) = oneshot::channel();
        self.tx
            .send(QueuedMessage { message, reply_to })
            .await
            .map_err(|_| QueueError::Closed)?;
        reply.await.map_err(|_| QueueError::NoReply)
    }
}

/// Receiving half, held by the message-driven redirector.
#[derive(Debug)]
pub struct MessageReceiver {
    rx: mpsc::Receiver<QueuedMessage>,
}

impl MessageReceiver {
    pub async fn recv(&mut self) -> Option<QueuedMessage> {
        self.rx.recv().await
    }
}

pub fn message_queue(capacity: usize) -> (MessageSender, MessageReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (MessageSender { tx }, MessageReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_waits_for_the_reply() {
        let (sender, mut receiver) = message_queue(4);
        let server = tokio::spawn(async move {
            let queued = receiver.recv().await.unwrap();
            let echo = queued.message.body.to_uppercase();
            queued.reply(Message::new(WireParams::new(), echo)).unwrap();
        });

        let reply = sender
            .request(Message::new(WireParams::new(), "ping"))
            .await
            .unwrap();
        assert_eq!(reply.body, "PING");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_request_reports_no_reply() {
        let (sender, mut receiver) = message_queue(1);
        let server = tokio::spawn(async move {
            let _ = receiver.recv().await;
        });
        let err = sender.request(Message::default()).await.unwrap_err();
        assert_eq!(err, QueueError::NoReply);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (sender, receiver) = message_queue(1);
        drop(receiver);
        let err = sender.request(Message::default()).await.unwrap_err();
        assert_eq!(err, QueueError::Closed);
    }

    #[test]
    fn fault_reads_the_fault_property() {
        let mut properties = WireParams::new();
        properties.set(FAULT_HEADER, "protocol");
        assert_eq!(Message::new(properties, "").fault(), Some("protocol"));
        assert_eq!(Message::default().fault(), None);
    }
}
