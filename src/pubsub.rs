use std::collections::HashMap;
use std::sync::RwLock;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Error, Debug)]
pub enum PubSubError {
    #[error("pubsub lock poisoned")]
    Lock,
    #[error("pubsub transport error: {0}")]
    Transport(String),
}

/// Topic-based fanout of string payloads. Delivery is at-most-once to the
/// subscribers present at publish time; nothing is buffered for late joiners.
#[async_trait]
pub trait PubSub: Send + Sync {
    /// Returns how many subscribers the payload was handed to.
    async fn publish(&self, topic: &str, payload: String) -> Result<usize, PubSubError>;

    async fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<String>, PubSubError>;

    /// Ends a topic. Current subscribers see the end of the stream once they
    /// drain what was already delivered. Returns whether the topic existed.
    async fn close(&self, topic: &str) -> Result<bool, PubSubError>;
}

/// In-process [`PubSub`] with one broadcast channel per topic.
pub struct LocalPubSub {
    topics: RwLock<HashMap<String, broadcast::Sender<String>>>,
    capacity: usize,
}

impl LocalPubSub {
    pub fn new(capacity: usize) -> Self {
        LocalPubSub {
            topics: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn topic_count(&self) -> usize {
        self.topics.read().map(|topics| topics.len()).unwrap_or(0)
    }
}

#[async_trait]
impl PubSub for LocalPubSub {
    async fn publish(&self, topic: &str, payload: String) -> Result<usize, PubSubError> {
        let delivered = {
            let topics = self.topics.read().map_err(|_| PubSubError::Lock)?;
            match topics.get(topic) {
                Some(tx) => tx.send(payload).ok(),
                None => return Ok(0),
            }
        };

        match delivered {
            Some(count) => Ok(count),
            None => {
                // Every receiver is gone; forget the channel.
                let mut topics = self.topics.write().map_err(|_| PubSubError::Lock)?;
                if topics.get(topic).is_some_and(|tx| tx.receiver_count() == 0) {
                    topics.remove(topic);
                    tracing::debug!(topic, "dropped idle topic");
                }
                Ok(0)
            }
        }
    }

    async fn subscribe(&self, topic: &str) -> Result<broadcast::Receiver<String>, PubSubError> {
        let mut topics = self.topics.write().map_err(|_| PubSubError::Lock)?;
        topics.retain(|_, tx| tx.receiver_count() > 0);
        let rx = match topics.get(topic) {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = broadcast::channel(self.capacity);
                topics.insert(topic.to_string(), tx);
                rx
            }
        };
        Ok(rx)
    }

    async fn close(&self, topic: &str) -> Result<bool, PubSubError> {
        let mut topics = self.topics.write().map_err(|_| PubSubError::Lock)?;
        // Dropping the last sender closes every receiver.
        let closed = topics.remove(topic).is_some();
        if closed {
            tracing::debug!(topic, "closed topic");
        }
        Ok(closed)
    }
}
