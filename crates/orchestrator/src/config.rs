//! Orchestrator tuning loaded from environment variables.

use std::time::Duration;

use ports::RetryConfig;

/// Cache lifetimes and compensation limits.
///
/// Reads from environment variables:
/// - `ORDER_CACHE_TTL_SECS`: single order entries (default: `3600`)
/// - `ORDER_LIST_CACHE_TTL_SECS`: order list pages (default: `300`)
/// - `ADDRESS_CACHE_TTL_SECS`: a user's address list (default: `3600`)
/// - `SLOT_CACHE_TTL_SECS`: available slots of a day (default: `60`)
/// - `COMPENSATION_TIMEOUT_MS`: bound on a compensating slot release (default: `2000`)
/// - `EVENT_PUBLISH_MAX_ATTEMPTS`: attempts per lifecycle event (default: `3`)
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub order_cache_ttl_secs: u64,
    pub order_list_cache_ttl_secs: u64,
    pub address_cache_ttl_secs: u64,
    pub slot_cache_ttl_secs: u64,
    pub compensation_timeout: Duration,
    pub event_publish_max_attempts: u32,
}

impl OrchestratorConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            order_cache_ttl_secs: env_or("ORDER_CACHE_TTL_SECS", defaults.order_cache_ttl_secs),
            order_list_cache_ttl_secs: env_or(
                "ORDER_LIST_CACHE_TTL_SECS",
                defaults.order_list_cache_ttl_secs,
            ),
            address_cache_ttl_secs: env_or(
                "ADDRESS_CACHE_TTL_SECS",
                defaults.address_cache_ttl_secs,
            ),
            slot_cache_ttl_secs: env_or("SLOT_CACHE_TTL_SECS", defaults.slot_cache_ttl_secs),
            compensation_timeout: Duration::from_millis(env_or(
                "COMPENSATION_TIMEOUT_MS",
                defaults.compensation_timeout.as_millis() as u64,
            )),
            event_publish_max_attempts: env_or(
                "EVENT_PUBLISH_MAX_ATTEMPTS",
                defaults.event_publish_max_attempts,
            ),
        }
    }

    /// Backoff policy for the event publisher.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default().with_max_attempts(self.event_publish_max_attempts)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            order_cache_ttl_secs: 3600,
            order_list_cache_ttl_secs: 300,
            address_cache_ttl_secs: 3600,
            slot_cache_ttl_secs: 60,
            compensation_timeout: Duration::from_millis(2000),
            event_publish_max_attempts: 3,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.order_cache_ttl_secs, 3600);
        assert_eq!(config.order_list_cache_ttl_secs, 300);
        assert_eq!(config.slot_cache_ttl_secs, 60);
        assert_eq!(config.compensation_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_retry_config_uses_attempts() {
        let config = OrchestratorConfig {
            event_publish_max_attempts: 5,
            ..OrchestratorConfig::default()
        };
        assert_eq!(config.retry_config().max_attempts, 5);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        assert_eq!(env_or("ORCHESTRATOR_TEST_UNSET_VARIABLE", 42u64), 42);
    }
}
