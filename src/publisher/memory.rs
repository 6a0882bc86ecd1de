//! Capturing event publisher for development and tests

use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{BorrowEvent, BorrowEventType};

use super::{EventPublisher, PublishError};

#[derive(Default)]
pub struct MemoryEventPublisher {
    events: Mutex<Vec<(String, BorrowEvent)>>,
}

impl MemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every published (topic, event) pair, in publish order.
    pub fn published(&self) -> Vec<(String, BorrowEvent)> {
        self.events.lock().expect("event log mutex poisoned").clone()
    }

    /// Events published on one topic, in publish order.
    pub fn published_on(&self, topic: &str) -> Vec<BorrowEvent> {
        self.published()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, e)| e)
            .collect()
    }

    /// Just the event types seen on one topic, in publish order.
    pub fn types_on(&self, topic: &str) -> Vec<BorrowEventType> {
        self.published_on(topic)
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }
}

#[async_trait]
impl EventPublisher for MemoryEventPublisher {
    async fn publish(&self, topic: &str, event: &BorrowEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .expect("event log mutex poisoned")
            .push((topic.to_string(), event.clone()));
        Ok(())
    }
}
