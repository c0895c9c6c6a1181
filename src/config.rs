use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::{circuit_breaker::CircuitBreakerConfig, retry::RetryConfig};

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub rabbitmq_url: String,
    #[serde(default = "default_event_queue_name")]
    pub event_queue_name: String,
    #[serde(default = "default_notification_queue_name")]
    pub notification_queue_name: String,
    #[serde(default = "default_failed_queue_name")]
    pub failed_queue_name: String,
    pub prefetch_count: u16,

    pub redis_url: String,

    pub database_url: String,

    /// URN of this service, e.g. `urn:ads:platform:notification-service`.
    pub service_id: String,
    pub access_token_url: String,
    pub client_id: String,
    pub client_secret: String,

    pub configuration_service_url: String,
    #[serde(default = "default_configuration_cache_ttl_seconds")]
    pub configuration_cache_ttl_seconds: u64,

    pub tenant_service_url: String,

    #[serde(default = "default_subscription_page_size")]
    pub subscription_page_size: usize,
    #[serde(default = "default_max_subscription_pages")]
    pub max_subscription_pages: usize,

    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_timeout_seconds: u64,
    pub circuit_breaker_success_threshold: u32,

    pub max_retry_attempts: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub retry_backoff_multiplier: u64,

    pub worker_concurrency: usize,

    pub server_port: u16,
}

fn default_event_queue_name() -> String {
    "event-notification".to_string()
}

fn default_notification_queue_name() -> String {
    "notification-send".to_string()
}

fn default_failed_queue_name() -> String {
    "event-notification-failed".to_string()
}

fn default_configuration_cache_ttl_seconds() -> u64 {
    900
}

fn default_subscription_page_size() -> usize {
    1000
}

fn default_max_subscription_pages() -> usize {
    1000
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;

        if config.subscription_page_size == 0 || config.max_subscription_pages == 0 {
            return Err(anyhow!(
                "SUBSCRIPTION_PAGE_SIZE and MAX_SUBSCRIPTION_PAGES must be positive"
            ));
        }

        if config.worker_concurrency == 0 {
            return Err(anyhow!("WORKER_CONCURRENCY must be positive"));
        }

        Ok(config)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retry_attempts,
            initial_delay_ms: self.initial_retry_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
            backoff_multiplier: self.retry_backoff_multiplier,
        }
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker_failure_threshold,
            timeout_seconds: self.circuit_breaker_timeout_seconds,
            success_threshold: self.circuit_breaker_success_threshold,
        }
    }
}
