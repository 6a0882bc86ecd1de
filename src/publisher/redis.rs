//! Redis Streams event publisher.
//!
//! One stream per topic, appended with XADD. The JSON payload travels in a
//! `payload` field next to `loan_id` and `event_type` fields so consumers
//! can filter without parsing the body.

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::models::BorrowEvent;

use super::{EventPublisher, PublishError};

#[derive(Clone)]
pub struct RedisEventPublisher {
    conn: ConnectionManager,
}

impl RedisEventPublisher {
    /// Connect and verify the server responds before accepting traffic.
    pub async fn new(url: &str) -> Result<Self, PublishError> {
        let client = redis::Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    #[tracing::instrument(skip(self, event), fields(loan_id = event.loan_id, event_type = %event.event_type))]
    async fn publish(&self, topic: &str, event: &BorrowEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.conn.clone();

        // XADD with auto-generated ID (*)
        let _: String = redis::cmd("XADD")
            .arg(topic)
            .arg("*")
            .arg("loan_id")
            .arg(event.loan_id)
            .arg("event_type")
            .arg(event.event_type.to_string())
            .arg("payload")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        Ok(())
    }
}
