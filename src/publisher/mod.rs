//! Event publishing.
//!
//! At-least-once: a publish failure after a committed transition is logged
//! by the caller and never undone. Events are keyed by loan id so a
//! downstream consumer can keep per-loan ordering.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::BorrowEvent;

pub mod memory;
pub mod redis;

pub use memory::MemoryEventPublisher;
pub use redis::RedisEventPublisher;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Append `event` to `topic`. Delivery is at-least-once; the event's
    /// `loan_id` is carried as the partition key.
    async fn publish(&self, topic: &str, event: &BorrowEvent) -> Result<(), PublishError>;
}
