use serde::{Deserialize, Serialize};

use crate::models::{event::DomainEvent, subscriber::SubscriberSummary, tenant::Tenant};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub subject: String,

    #[serde(default)]
    pub body: String,
}

impl Template {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Rendered subject and body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext<'a> {
    pub event: &'a DomainEvent,
    pub subscriber: &'a SubscriberSummary,
    pub tenant: &'a Tenant,
}
