use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};

use crate::models::tenant::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Mail,
    Slack,
}

impl Channel {
    pub fn as_str(&self) -> &str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Mail => "mail",
            Channel::Slack => "slack",
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberChannel {
    pub channel: Channel,
    pub address: String,

    #[serde(default)]
    pub verified: bool,
}

impl SubscriberChannel {
    pub fn verified(channel: Channel, address: impl Into<String>) -> Self {
        Self {
            channel,
            address: address.into(),
            verified: true,
        }
    }

    pub fn unverified(channel: Channel, address: impl Into<String>) -> Self {
        Self {
            channel,
            address: address.into(),
            verified: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub id: String,
    pub tenant_id: TenantId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    pub address_as: String,

    /// Ordered by subscriber preference.
    #[serde(default)]
    pub channels: Vec<SubscriberChannel>,
}

impl Subscriber {
    pub fn new(id: impl Into<String>, tenant_id: TenantId, address_as: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tenant_id,
            urn: None,
            user_id: None,
            address_as: address_as.into(),
            channels: Vec::new(),
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_channel(mut self, channel: SubscriberChannel) -> Self {
        self.channels.push(channel);
        self
    }
}

/// Subscriber fields exposed to templates and carried on notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberSummary {
    pub id: String,

    #[serde(default)]
    pub user_id: Option<String>,

    pub address_as: String,
}

impl From<&Subscriber> for SubscriberSummary {
    fn from(subscriber: &Subscriber) -> Self {
        Self {
            id: subscriber.id.clone(),
            user_id: subscriber.user_id.clone(),
            address_as: subscriber.address_as.clone(),
        }
    }
}
