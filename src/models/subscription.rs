use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::{
    event::{DomainEvent, EventContext},
    notification_type::{NotificationType, NotificationTypeEvent},
    subscriber::{Subscriber, SubscriberChannel},
    tenant::TenantId,
};

/// Numbers compare by value, so `1` matches `1.0`. Everything else must be
/// strictly equal, and `2` never matches `"2"`.
fn context_value_matches(expected: &JsonValue, actual: &JsonValue) -> bool {
    match (expected.as_f64(), actual.as_f64()) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => expected == actual,
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<EventContext>,
}

impl SubscriptionCriteria {
    pub fn correlated(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
            context: None,
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context
            .get_or_insert_with(EventContext::new)
            .insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub tenant_id: TenantId,
    pub type_id: String,
    pub subscriber_id: String,

    #[serde(default)]
    pub criteria: SubscriptionCriteria,

    /// Populated when read back from the repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber: Option<Subscriber>,
}

impl Subscription {
    pub fn new(
        tenant_id: TenantId,
        type_id: impl Into<String>,
        subscriber: Subscriber,
        criteria: Option<SubscriptionCriteria>,
    ) -> Self {
        Self {
            tenant_id,
            type_id: type_id.into(),
            subscriber_id: subscriber.id.clone(),
            criteria: criteria.unwrap_or_default(),
            subscriber: Some(subscriber),
        }
    }

    pub fn should_send(&self, event: Option<&DomainEvent>) -> bool {
        let Some(event) = event else {
            return false;
        };

        if let Some(correlation_id) = &self.criteria.correlation_id
            && event.correlation_id.as_deref() != Some(correlation_id.as_str())
        {
            return false;
        }

        self.criteria.context.as_ref().is_none_or(|context| {
            context
                .iter()
                .all(|(key, value)| {
                    event
                        .context
                        .get(key)
                        .is_some_and(|actual| context_value_matches(value, actual))
                })
        })
    }

    /// First verified subscriber channel, in preference order, that the type
    /// allows and the event binding has a template for.
    pub fn get_subscriber_channel(
        &self,
        notification_type: &NotificationType,
        type_event: &NotificationTypeEvent,
    ) -> Option<&SubscriberChannel> {
        self.subscriber.as_ref()?.channels.iter().find(|channel| {
            channel.verified
                && notification_type.allows_channel(channel.channel)
                && type_event.templates.contains_key(&channel.channel)
        })
    }
}
