//! Exponential backoff for event publishing.

use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tokio::time::sleep;

use crate::{EventPublisher, OrderLifecycleEvent, PublishError};

/// Backoff settings for transient publish failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        let next = Duration::from_millis((delay.as_millis() as f64 * self.multiplier) as u64);
        next.min(self.max_delay)
    }
}

/// Publisher decorator that retries transient failures with backoff.
///
/// Permanent failures (serialization, missing order id) are returned after
/// the first attempt.
#[derive(Debug, Clone)]
pub struct RetryingPublisher<P> {
    inner: P,
    config: RetryConfig,
}

impl<P: EventPublisher> RetryingPublisher<P> {
    pub fn new(inner: P, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: EventPublisher> EventPublisher for RetryingPublisher<P> {
    async fn publish(&self, event: OrderLifecycleEvent) -> Result<(), PublishError> {
        let mut attempt = 0;
        let mut delay = self.config.initial_delay;

        loop {
            attempt += 1;

            match self.inner.publish(event.clone()).await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(
                            attempt,
                            event_id = %event.event_id,
                            subject = event.subject(),
                            "Event published after retry"
                        );
                    }
                    return Ok(());
                }
                Err(error) if !error.is_transient() => {
                    tracing::error!(
                        event_id = %event.event_id,
                        error = %error,
                        "Permanent publish failure, not retrying"
                    );
                    return Err(error);
                }
                Err(error) if attempt >= self.config.max_attempts => {
                    tracing::error!(
                        attempt,
                        event_id = %event.event_id,
                        error = %error,
                        "Event publish failed after all retries"
                    );
                    return Err(error);
                }
                Err(error) => {
                    tracing::warn!(
                        attempt,
                        event_id = %event.event_id,
                        error = %error,
                        delay_ms = delay.as_millis() as u64,
                        "Event publish failed, retrying after delay"
                    );
                    counter!("event_publish_retries_total").increment(1);

                    sleep(delay).await;
                    delay = self.config.next_delay(delay);
                }
            }
        }
    }
}
