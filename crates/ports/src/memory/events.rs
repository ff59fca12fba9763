use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{read, write};
use crate::{EventPublisher, OrderEventType, OrderLifecycleEvent, PublishError};

#[derive(Debug, Default)]
struct InMemoryEventState {
    published: Vec<OrderLifecycleEvent>,
    attempts: usize,
    fail_on_publish: bool,
    fail_remaining: usize,
}

/// In-memory event publisher that records every accepted event.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    state: Arc<RwLock<InMemoryEventState>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every publish fail with a broker error.
    pub fn set_fail_on_publish(&self, fail: bool) {
        write(&self.state).fail_on_publish = fail;
    }

    /// Makes the next `count` publishes fail with a broker error.
    pub fn fail_next(&self, count: usize) {
        write(&self.state).fail_remaining = count;
    }

    /// Events accepted so far, in publish order.
    pub fn published(&self) -> Vec<OrderLifecycleEvent> {
        read(&self.state).published.clone()
    }

    pub fn published_of_type(&self, event_type: OrderEventType) -> Vec<OrderLifecycleEvent> {
        read(&self.state)
            .published
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Number of publish calls, successful or not.
    pub fn attempt_count(&self) -> usize {
        read(&self.state).attempts
    }

    pub fn clear(&self) {
        let mut state = write(&self.state);
        state.published.clear();
        state.attempts = 0;
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: OrderLifecycleEvent) -> Result<(), PublishError> {
        let mut state = write(&self.state);
        state.attempts += 1;

        if state.fail_on_publish {
            return Err(PublishError::Broker("simulated broker outage".to_string()));
        }
        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            return Err(PublishError::Broker("simulated transient failure".to_string()));
        }

        tracing::debug!(
            subject = event.subject(),
            order_id = %event.order_id,
            "Recorded lifecycle event"
        );
        state.published.push(event);
        Ok(())
    }
}
