//! Message bus seam.
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("bus rejected message: {0}")]
    Rejected(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("bus connection is closed")]
    Closed,
}

/// Publisher on the platform's shared management channel.
#[async_trait]
pub trait MessageBus: Send + Sync + 'static {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;

    async fn close(&self) -> Result<(), PublishError>;
}
