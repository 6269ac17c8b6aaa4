use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use super::StatusEvent;
use crate::error::OrchestratorError;

/// Sink for outbound status notifications
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(&self, event: StatusEvent) -> Result<(), PublishError>;
}

/// In-process broadcast publisher for status change events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub event: StatusEvent,
    pub published_at: DateTime<Utc>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl StatusPublisher for EventPublisher {
    async fn publish(&self, event: StatusEvent) -> Result<(), PublishError> {
        let published = PublishedEvent {
            event,
            published_at: Utc::now(),
        };

        // No subscribers is not an error for status notifications
        match self.sender.send(published) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(_)) => Ok(()),
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event channel is closed")]
    ChannelClosed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<PublishError> for OrchestratorError {
    fn from(err: PublishError) -> Self {
        OrchestratorError::Messaging(err.to_string())
    }
}
