use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::tenant::TenantId;

pub type EventContext = BTreeMap<String, JsonValue>;

/// Immutable fact published by another service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub tenant_id: TenantId,
    pub namespace: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(default)]
    pub context: EventContext,

    #[serde(default)]
    pub payload: JsonValue,
}

impl DomainEvent {
    pub fn new(
        tenant_id: TenantId,
        namespace: impl Into<String>,
        name: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            namespace: namespace.into(),
            name: name.into(),
            timestamp,
            correlation_id: None,
            context: EventContext::new(),
            payload: JsonValue::Null,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = payload;
        self
    }

    /// `namespace:name` key used in logs and binding lookups.
    pub fn key(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }

    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }
}
