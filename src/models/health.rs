use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: HealthStatus,
    pub timestamp: String,
    pub checks: HashMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    pub fn healthy(response_time_ms: u64) -> Self {
        Self {
            status: HealthStatus::Healthy,
            response_time_ms: Some(response_time_ms),
            circuit_breaker: None,
            error: None,
        }
    }

    pub fn unhealthy(error: String) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            response_time_ms: None,
            circuit_breaker: None,
            error: Some(error),
        }
    }

    pub fn degraded(circuit_state: String, error: Option<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            response_time_ms: None,
            circuit_breaker: Some(circuit_state),
            error,
        }
    }

    pub fn with_circuit_breaker(mut self, state: String) -> Self {
        self.circuit_breaker = Some(state);
        self
    }
}

/// Any unhealthy component makes the service unhealthy; open circuits only
/// degrade it.
pub fn overall_status(checks: &HashMap<String, ComponentHealth>) -> HealthStatus {
    let mut status = HealthStatus::Healthy;

    for health in checks.values() {
        match health.status {
            HealthStatus::Unhealthy => return HealthStatus::Unhealthy,
            HealthStatus::Degraded => status = HealthStatus::Degraded,
            HealthStatus::Healthy => {}
        }
    }

    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_circuit_degrades_but_unhealthy_dominates() {
        let mut checks = HashMap::new();
        checks.insert("database".to_string(), ComponentHealth::healthy(3));
        checks.insert(
            "configuration_service".to_string(),
            ComponentHealth::degraded("open".to_string(), None),
        );
        assert_eq!(overall_status(&checks), HealthStatus::Degraded);

        checks.insert(
            "message_broker".to_string(),
            ComponentHealth::unhealthy("Connection failed".to_string()),
        );
        assert_eq!(overall_status(&checks), HealthStatus::Unhealthy);
    }
}
