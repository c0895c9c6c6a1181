use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::{NotificationError, NotificationResult},
    models::{
        event::DomainEvent,
        notification::{Notification, NotificationEventRef, NotificationTypeRef},
        subscriber::{Channel, Subscriber, SubscriberSummary},
        subscription::{Subscription, SubscriptionCriteria},
        template::{Template, TemplateContext},
        tenant::{Tenant, TenantId},
        user::{ServiceRole, User, has_any_role},
    },
    repository::SubscriptionRepository,
    services::TemplateService,
    utils::get_template_body,
};

/// Binding of a notification type to one domain event, with a template per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationTypeEvent {
    pub namespace: String,
    pub name: String,

    #[serde(default)]
    pub templates: BTreeMap<Channel, Template>,
}

impl NotificationTypeEvent {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            templates: BTreeMap::new(),
        }
    }

    pub fn with_template(mut self, channel: Channel, template: Template) -> Self {
        self.templates.insert(channel, template);
        self
    }

    pub fn key(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }

    fn matches(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }
}

/// Raw notification type as stored in the configuration service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationTypeDefinition {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub public_subscribe: bool,

    #[serde(default)]
    pub manage_subscribe: bool,

    #[serde(default)]
    pub subscriber_roles: Vec<String>,

    #[serde(default)]
    pub channels: Vec<Channel>,

    #[serde(default)]
    pub events: Vec<NotificationTypeEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationType {
    tenant_id: Option<TenantId>,
    id: String,
    name: String,
    description: String,
    public_subscribe: bool,
    manage_subscribe: bool,
    subscriber_roles: HashSet<String>,
    channels: BTreeSet<Channel>,
    events: Vec<NotificationTypeEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct NotificationTypeBuilder {
    tenant_id: Option<TenantId>,
    id: String,
    name: String,
    description: String,
    public_subscribe: bool,
    manage_subscribe: bool,
    subscriber_roles: HashSet<String>,
    channels: BTreeSet<Channel>,
    events: Vec<NotificationTypeEvent>,
}

impl NotificationTypeBuilder {
    pub fn tenant_id(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn public_subscribe(mut self, public_subscribe: bool) -> Self {
        self.public_subscribe = public_subscribe;
        self
    }

    pub fn manage_subscribe(mut self, manage_subscribe: bool) -> Self {
        self.manage_subscribe = manage_subscribe;
        self
    }

    pub fn subscriber_role(mut self, role: impl Into<String>) -> Self {
        self.subscriber_roles.insert(role.into());
        self
    }

    pub fn channel(mut self, channel: Channel) -> Self {
        self.channels.insert(channel);
        self
    }

    pub fn event(mut self, event: NotificationTypeEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn build(self) -> NotificationResult<NotificationType> {
        if self.id.trim().is_empty() {
            return Err(NotificationError::InvalidDefinition(
                "notification type id is required".to_string(),
            ));
        }

        if self.name.trim().is_empty() {
            return Err(NotificationError::InvalidDefinition(format!(
                "notification type {} has no name",
                self.id
            )));
        }

        if self.events.is_empty() {
            return Err(NotificationError::InvalidDefinition(format!(
                "notification type {} has no events",
                self.id
            )));
        }

        let mut keys = HashSet::new();
        for event in &self.events {
            if !keys.insert((event.namespace.as_str(), event.name.as_str())) {
                return Err(NotificationError::InvalidDefinition(format!(
                    "notification type {} binds event {} more than once",
                    self.id,
                    event.key()
                )));
            }
        }

        Ok(NotificationType {
            tenant_id: self.tenant_id,
            id: self.id,
            name: self.name,
            description: self.description,
            public_subscribe: self.public_subscribe,
            manage_subscribe: self.manage_subscribe,
            subscriber_roles: self.subscriber_roles,
            channels: self.channels,
            events: self.events,
        })
    }
}

impl TryFrom<NotificationTypeDefinition> for NotificationType {
    type Error = NotificationError;

    fn try_from(definition: NotificationTypeDefinition) -> Result<Self, Self::Error> {
        let mut builder = NotificationType::builder(definition.id, definition.name)
            .description(definition.description)
            .public_subscribe(definition.public_subscribe)
            .manage_subscribe(definition.manage_subscribe);

        for role in definition.subscriber_roles {
            builder = builder.subscriber_role(role);
        }
        for channel in definition.channels {
            builder = builder.channel(channel);
        }
        for event in definition.events {
            builder = builder.event(event);
        }

        builder.build()
    }
}

impl NotificationType {
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> NotificationTypeBuilder {
        NotificationTypeBuilder {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }

    pub fn public_subscribe(&self) -> bool {
        self.public_subscribe
    }

    pub fn manage_subscribe(&self) -> bool {
        self.manage_subscribe
    }

    pub fn subscriber_roles(&self) -> &HashSet<String> {
        &self.subscriber_roles
    }

    pub fn channels(&self) -> &BTreeSet<Channel> {
        &self.channels
    }

    pub fn events(&self) -> &[NotificationTypeEvent] {
        &self.events
    }

    pub fn with_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn allows_channel(&self, channel: Channel) -> bool {
        self.channels.contains(&channel)
    }

    pub fn get_event(&self, namespace: &str, name: &str) -> Option<&NotificationTypeEvent> {
        self.events.iter().find(|event| event.matches(namespace, name))
    }

    pub fn is_bound_to(&self, event: &DomainEvent) -> bool {
        self.get_event(&event.namespace, &event.name).is_some()
    }

    /// Administrators can manage any subscription; users can manage their own
    /// only when the type opts into self-service.
    pub fn can_subscribe(&self, user: Option<&User>, subscriber: &Subscriber) -> bool {
        let tenant_id = self.tenant_id.as_ref();

        if has_any_role(
            user,
            tenant_id,
            &[ServiceRole::SubscriptionAdmin, ServiceRole::SubscriptionApp],
            true,
        ) {
            return true;
        }

        let Some(user) = user else {
            return false;
        };

        let is_self = subscriber.user_id.as_deref() == Some(user.id.as_str());
        let subscriber_roles: Vec<&str> = self.subscriber_roles.iter().map(String::as_str).collect();
        let may_subscribe =
            self.public_subscribe || has_any_role(Some(user), tenant_id, subscriber_roles.as_slice(), false);

        is_self && may_subscribe && self.manage_subscribe
    }

    pub async fn subscribe(
        &self,
        repository: &dyn SubscriptionRepository,
        user: Option<&User>,
        subscriber: &Subscriber,
        criteria: Option<SubscriptionCriteria>,
    ) -> NotificationResult<Subscription> {
        if !self.can_subscribe(user, subscriber) {
            return Err(NotificationError::Unauthorized(
                "User not authorized to subscribe.".to_string(),
            ));
        }

        let subscription = Subscription::new(
            subscriber.tenant_id.clone(),
            self.id.clone(),
            subscriber.clone(),
            criteria,
        );

        repository.save_subscription(subscription).await
    }

    pub async fn unsubscribe(
        &self,
        repository: &dyn SubscriptionRepository,
        user: Option<&User>,
        subscriber: &Subscriber,
    ) -> NotificationResult<bool> {
        if !self.can_subscribe(user, subscriber) {
            return Err(NotificationError::Unauthorized(
                "User not authorized to unsubscribe.".to_string(),
            ));
        }

        repository
            .delete_subscriptions(&subscriber.tenant_id, &self.id, &subscriber.id)
            .await
    }

    /// Renders notifications for every subscription that matches `event`, in
    /// input order. Subscriptions without a usable channel are skipped.
    pub fn generate_notifications(
        &self,
        template_service: &dyn TemplateService,
        tenant: &Tenant,
        event: &DomainEvent,
        subscriptions: &[Subscription],
    ) -> NotificationResult<Vec<Notification>> {
        let mut notifications = Vec::new();

        for subscription in subscriptions {
            if !subscription.should_send(Some(event)) {
                continue;
            }

            if let Some(notification) =
                self.generate_notification(template_service, tenant, event, subscription)?
            {
                notifications.push(notification);
            }
        }

        Ok(notifications)
    }

    fn generate_notification(
        &self,
        template_service: &dyn TemplateService,
        tenant: &Tenant,
        event: &DomainEvent,
        subscription: &Subscription,
    ) -> NotificationResult<Option<Notification>> {
        let Some(type_event) = self.get_event(&event.namespace, &event.name) else {
            return Ok(None);
        };

        let (Some(subscriber), Some(channel)) = (
            subscription.subscriber.as_ref(),
            subscription.get_subscriber_channel(self, type_event),
        ) else {
            warn!(
                subscriber_id = %subscription.subscriber_id,
                address_as = subscription.subscriber.as_ref().map(|s| s.address_as.as_str()).unwrap_or_default(),
                type_id = %self.id,
                event = %event.key(),
                tenant_id = %event.tenant_id,
                "No matching channel for subscriber"
            );
            return Ok(None);
        };

        let Some(template) = type_event.templates.get(&channel.channel) else {
            return Ok(None);
        };

        let template = if channel.channel == Channel::Email {
            Template {
                subject: template.subject.clone(),
                body: get_template_body(&template.body),
            }
        } else {
            template.clone()
        };

        let summary = SubscriberSummary::from(subscriber);
        let message = template_service.generate_message(
            &template,
            &TemplateContext {
                event,
                subscriber: &summary,
                tenant,
            },
        )?;

        Ok(Some(Notification {
            tenant_id: event.tenant_id.to_string(),
            notification_type: NotificationTypeRef {
                id: self.id.clone(),
                name: self.name.clone(),
            },
            event: NotificationEventRef {
                namespace: event.namespace.clone(),
                name: event.name.clone(),
                timestamp: event.timestamp,
            },
            correlation_id: event.correlation_id.clone(),
            context: event.context.clone(),
            to: channel.address.clone(),
            channel: channel.channel,
            message,
            subscriber: summary,
        }))
    }

    /// Applies a tenant customization on top of this type. Only events already
    /// bound on this type are considered; custom templates win per channel.
    pub fn override_with(&self, custom: &NotificationType) -> NotificationType {
        let mut merged = self.clone();

        for event in &mut merged.events {
            for custom_event in custom
                .events
                .iter()
                .filter(|custom_event| custom_event.matches(&event.namespace, &event.name))
            {
                for (channel, template) in &custom_event.templates {
                    event.templates.insert(*channel, template.clone());
                }
            }
        }

        merged
    }
}
