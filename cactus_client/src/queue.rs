//! Message queue transport.
//!
//! Each exchange is one request message whose properties carry every wire
//! parameter and whose body carries the user data. The reply is complete when
//! it arrives, so draining only reshapes it.

use crate::config::ClientConfiguration;
use crate::connection::{Connection, ConnectionHelper, HttpConnection};
use crate::error::Result;
use crate::request::WebRequest;
use async_trait::async_trait;
use bytes::Bytes;
use cactus_common::message::{Message, MessageSender};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct QueueConnectionHelper {
    sender: MessageSender,
    destination: String,
}

impl QueueConnectionHelper {
    pub fn new(sender: MessageSender, destination: impl Into<String>) -> Self {
        Self {
            sender,
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }
}

#[async_trait]
impl ConnectionHelper for QueueConnectionHelper {
    async fn connect(
        &self,
        request: &WebRequest,
        _config: &ClientConfiguration,
    ) -> Result<Box<dyn Connection>> {
        let body = request
            .user_data()
            .map(|data| data.content.clone())
            .unwrap_or_default();
        let message = Message::new(request.wire_params(), body);
        debug!(destination = %self.destination, "Sending request message");
        let reply = self.sender.request(message).await?;
        Ok(Box::new(QueueConnection {
            url: format!("queue:{}", self.destination),
            reply,
        }))
    }
}

struct QueueConnection {
    url: String,
    reply: Message,
}

#[async_trait]
impl Connection for QueueConnection {
    fn url(&self) -> &str {
        &self.url
    }

    /// Faults read as 500, anything else as 200.
    fn status(&self) -> u16 {
        if self.reply.fault().is_some() { 500 } else { 200 }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.reply
            .properties
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    async fn drain(self: Box<Self>) -> Result<HttpConnection> {
        let status = self.status();
        let this = *self;
        Ok(HttpConnection {
            url: this.url,
            status,
            headers: this
                .reply
                .properties
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            body: Bytes::from(this.reply.body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cactus_common::WireParams;
    use cactus_common::message::message_queue;
    use cactus_common::wire::FAULT_HEADER;

    #[tokio::test]
    async fn replies_become_drained_connections() {
        let (sender, mut receiver) = message_queue(1);
        let server = tokio::spawn(async move {
            let queued = receiver.recv().await.unwrap();
            assert_eq!(queued.message.property("user"), Some("alice"));
            assert_eq!(queued.message.body, "payload");
            let mut properties = WireParams::new();
            properties.set(FAULT_HEADER, "unsupported");
            queued.reply(Message::new(properties, "no sessions here")).unwrap();
        });

        let helper = QueueConnectionHelper::new(sender, "cactus.test");
        let mut request = WebRequest::new();
        request.add_parameter("user", "alice");
        request.set_user_data("payload", "text/plain");
        let connection = helper
            .connect(&request, &ClientConfiguration::default())
            .await
            .unwrap();
        assert_eq!(connection.status(), 500);
        assert_eq!(connection.header("x-cactus-fault"), Some("unsupported"));

        let drained = connection.drain().await.unwrap();
        assert_eq!(drained.fault(), Some("unsupported"));
        assert_eq!(drained.text(), "no sessions here");
        assert_eq!(drained.url, "queue:cactus.test");
        server.await.unwrap();
    }
}
