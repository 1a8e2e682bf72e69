//! Message bus abstraction
//!
//! The signing authority is reached over a topic-based bus. The bus itself
//! lives outside this workspace; adapters only bridge to it.

mod memory;
mod spool;

pub use memory::InMemoryBus;
pub use spool::SpoolBus;

use async_trait::async_trait;
use relctl_core::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Body field that ties a reply to its request
pub const CORRELATION_KEY: &str = "request_id";

/// Capacity of each subscription channel
const SUBSCRIPTION_BUFFER: usize = 64;

/// One message on a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    #[serde(default)]
    pub priority: Option<u8>,
    pub body: Value,
}

/// Stream of messages delivered to one subscriber
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<BusMessage>,
}

/// Correlation id carried in a message body, if any
pub fn correlation_id(body: &Value) -> Option<&str> {
    body.get(CORRELATION_KEY).and_then(Value::as_str)
}

impl Subscription {
    pub(crate) fn channel() -> (mpsc::Sender<BusMessage>, Self) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        (tx, Self { rx })
    }

    /// Next message, or `None` once the bus side has gone away
    pub async fn next(&mut self) -> Option<BusMessage> {
        self.rx.recv().await
    }
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Start receiving messages published to `topic` from now on
    async fn subscribe(&self, topic: &str) -> Result<Subscription>;

    /// Like [`subscribe`](Self::subscribe), but only messages whose
    /// [`CORRELATION_KEY`] equals `request_id` are delivered.
    ///
    /// Buses that give every subscriber its own copy may deliver
    /// everything. Buses where consuming a message removes it must leave
    /// other requests' messages in place.
    async fn subscribe_correlated(
        &self,
        topic: &str,
        _request_id: &str,
    ) -> Result<Subscription> {
        self.subscribe(topic).await
    }

    async fn publish(&self, message: BusMessage) -> Result<()>;
}
