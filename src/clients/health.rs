use std::{collections::HashMap, time::Instant};

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::{
    clients::{circuit_breaker::circuit_key, database::DatabaseClient, rbmq::RabbitMqClient},
    config::Config,
    models::{
        circuit_breaker::CircuitState,
        health::{ComponentHealth, HealthCheckResponse, overall_status},
    },
};

pub const CONFIGURATION_SERVICE: &str = "configuration_service";

pub struct HealthChecker {
    config: Config,
}

impl HealthChecker {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        checks.insert("database".to_string(), self.check_database().await);
        checks.insert("cache_service".to_string(), self.check_redis().await);
        checks.insert("message_broker".to_string(), self.check_rabbitmq().await);
        checks.insert(
            CONFIGURATION_SERVICE.to_string(),
            self.check_circuit_breaker(CONFIGURATION_SERVICE).await,
        );

        HealthCheckResponse {
            status: overall_status(&checks),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            checks,
        }
    }

    async fn check_database(&self) -> ComponentHealth {
        let start = Instant::now();

        match DatabaseClient::connect(&self.config.database_url).await {
            Ok(client) => match client.health_check().await {
                Ok(_) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    debug!(response_time_ms = elapsed, "Database health check passed");
                    ComponentHealth::healthy(elapsed)
                }
                Err(e) => {
                    warn!(error = %e, "Database health check failed");
                    ComponentHealth::unhealthy(format!("Health check query failed: {}", e))
                }
            },
            Err(e) => {
                warn!(error = %e, "Database connection failed");
                ComponentHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_redis(&self) -> ComponentHealth {
        let start = Instant::now();

        let ping = async {
            let client = redis::Client::open(self.config.redis_url.as_str())?;
            let mut connection = client.get_multiplexed_async_connection().await?;
            connection.ping::<String>().await
        };

        match ping.await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "Redis health check passed");
                ComponentHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "Redis health check failed");
                ComponentHealth::unhealthy(format!("Ping failed: {}", e))
            }
        }
    }

    async fn check_rabbitmq(&self) -> ComponentHealth {
        let start = Instant::now();

        match RabbitMqClient::connect(&self.config).await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "RabbitMQ health check passed");
                ComponentHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "RabbitMQ connection failed");
                ComponentHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_circuit_breaker(&self, service_name: &str) -> ComponentHealth {
        match self.get_circuit_breaker_state(service_name).await {
            Ok(state) => {
                debug!(service = service_name, circuit_state = %state, "Circuit breaker state checked");

                match state {
                    CircuitState::Closed => {
                        ComponentHealth::healthy(0).with_circuit_breaker(state.to_string())
                    }
                    CircuitState::HalfOpen => ComponentHealth::degraded(
                        state.to_string(),
                        Some("Circuit breaker in recovery mode".to_string()),
                    ),
                    CircuitState::Open => ComponentHealth::degraded(state.to_string(), None),
                }
            }
            Err(e) => {
                warn!(service = service_name, error = %e, "Failed to check circuit breaker state");
                ComponentHealth::unhealthy(format!("Cannot check circuit breaker: {}", e))
            }
        }
    }

    async fn get_circuit_breaker_state(&self, service_name: &str) -> Result<CircuitState> {
        let client = redis::Client::open(self.config.redis_url.as_str())?;
        let mut connection = client.get_multiplexed_async_connection().await?;

        let value: Option<String> = connection.get(circuit_key(service_name, "state")).await?;

        Ok(value
            .map(|s| CircuitState::parse(&s))
            .unwrap_or(CircuitState::Closed))
    }
}
