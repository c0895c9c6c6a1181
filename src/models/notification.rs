use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    event::EventContext, subscriber::Channel, subscriber::SubscriberSummary, template::Message,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationTypeRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEventRef {
    pub namespace: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

/// Rendered notification handed to the send queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub tenant_id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationTypeRef,
    pub event: NotificationEventRef,
    pub correlation_id: Option<String>,
    pub context: EventContext,
    pub to: String,
    pub channel: Channel,
    pub message: Message,
    pub subscriber: SubscriberSummary,
}
