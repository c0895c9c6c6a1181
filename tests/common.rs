use std::{
    io,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use notification_service::{
    error::{NotificationError, NotificationResult},
    models::{
        configuration::NotificationConfiguration,
        event::DomainEvent,
        notification::Notification,
        notification_type::{NotificationType, NotificationTypeEvent},
        subscriber::{Channel, Subscriber, SubscriberChannel},
        subscription::{Subscription, SubscriptionCriteria},
        template::Template,
        tenant::{Tenant, TenantId},
    },
    repository::{PageInfo, SubscriptionPage, SubscriptionRepository},
    services::{ConfigurationService, NotificationQueue, TenantService, TokenProvider},
};

pub const SERVICE_ID: &str = "urn:ads:platform:notification-service";

/// Log lines written by a test-local subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Installs a warn-level subscriber for the current thread. Logs are
    /// captured until the returned guard is dropped.
    pub fn capture() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        (logs, tracing::subscriber::set_default(subscriber))
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn tenant_id() -> TenantId {
    TenantId::new("T1")
}

pub fn tenant() -> Tenant {
    Tenant {
        id: tenant_id(),
        name: "Tenant One".to_string(),
        realm: "tenant-one".to_string(),
    }
}

pub fn form_submitted() -> DomainEvent {
    DomainEvent::new(
        tenant_id(),
        "form-service",
        "form-submitted",
        Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap(),
    )
}

pub fn form_status_type() -> NotificationType {
    NotificationType::builder("form-status-updates", "Form status updates")
        .description("Updates on submitted forms.")
        .public_subscribe(true)
        .manage_subscribe(true)
        .channel(Channel::Email)
        .event(
            NotificationTypeEvent::new("form-service", "form-submitted").with_template(
                Channel::Email,
                Template::new(
                    "Form submitted",
                    "<p>Hi {{subscriber.addressAs}}, your form was submitted.</p>",
                ),
            ),
        )
        .build()
        .unwrap()
}

pub fn email_subscriber(id: &str) -> Subscriber {
    Subscriber::new(id, tenant_id(), format!("Subscriber {}", id))
        .with_channel(SubscriberChannel::verified(Channel::Email, format!("{}@example.com", id)))
}

pub fn subscription(subscriber: Subscriber, criteria: Option<SubscriptionCriteria>) -> Subscription {
    Subscription::new(tenant_id(), "form-status-updates", subscriber, criteria)
}

/// Subscriptions kept in memory and paged by subscriber id.
#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    subscriptions: Mutex<Vec<Subscription>>,
    requested_after: Mutex<Vec<Option<String>>>,
}

impl InMemorySubscriptionRepository {
    pub fn with_subscriptions(subscriptions: Vec<Subscription>) -> Self {
        let repository = Self::default();
        for subscription in subscriptions {
            repository.insert(subscription);
        }
        repository
    }

    pub fn insert(&self, subscription: Subscription) {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        subscriptions.retain(|s| {
            !(s.tenant_id == subscription.tenant_id
                && s.type_id == subscription.type_id
                && s.subscriber_id == subscription.subscriber_id)
        });
        subscriptions.push(subscription);
        subscriptions.sort_by(|a, b| a.subscriber_id.cmp(&b.subscriber_id));
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn requested_after(&self) -> Vec<Option<String>> {
        self.requested_after.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn get_subscriptions(
        &self,
        notification_type: &NotificationType,
        top: usize,
        after: Option<String>,
    ) -> NotificationResult<SubscriptionPage> {
        self.requested_after.lock().unwrap().push(after.clone());

        let matching: Vec<Subscription> = self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| Some(&s.tenant_id) == notification_type.tenant_id())
            .filter(|s| s.type_id == notification_type.id())
            .filter(|s| after.as_ref().is_none_or(|after| &s.subscriber_id > after))
            .cloned()
            .collect();

        let has_next = matching.len() > top;
        let results: Vec<Subscription> = matching.into_iter().take(top).collect();
        let next = if has_next {
            results.last().map(|s| s.subscriber_id.clone())
        } else {
            None
        };

        Ok(SubscriptionPage {
            results,
            page: PageInfo { next },
        })
    }

    async fn save_subscription(&self, subscription: Subscription) -> NotificationResult<Subscription> {
        self.insert(subscription.clone());
        Ok(subscription)
    }

    async fn delete_subscriptions(
        &self,
        tenant_id: &TenantId,
        type_id: &str,
        subscriber_id: &str,
    ) -> NotificationResult<bool> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let before = subscriptions.len();
        subscriptions.retain(|s| {
            !(&s.tenant_id == tenant_id && s.type_id == type_id && s.subscriber_id == subscriber_id)
        });
        Ok(subscriptions.len() < before)
    }
}

/// Records enqueued notifications, optionally failing after a number of them.
#[derive(Default)]
pub struct RecordingQueue {
    notifications: Mutex<Vec<Notification>>,
    fail_after: Option<usize>,
}

impl RecordingQueue {
    pub fn failing_after(count: usize) -> Self {
        Self {
            notifications: Mutex::new(Vec::new()),
            fail_after: Some(count),
        }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationQueue for RecordingQueue {
    async fn enqueue(&self, notification: &Notification) -> NotificationResult<()> {
        let mut notifications = self.notifications.lock().unwrap();
        if self.fail_after.is_some_and(|limit| notifications.len() >= limit) {
            return Err(NotificationError::Queue("queue unavailable".to_string()));
        }
        notifications.push(notification.clone());
        Ok(())
    }
}

pub struct StaticTokenProvider;

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_access_token(&self) -> NotificationResult<String> {
        Ok("test-token".to_string())
    }
}

pub struct StaticConfigurationService {
    configuration: Arc<NotificationConfiguration>,
}

impl StaticConfigurationService {
    pub fn new(tenant_types: Vec<NotificationType>, core_types: Vec<NotificationType>) -> Self {
        Self {
            configuration: Arc::new(NotificationConfiguration::new(
                tenant_types,
                core_types,
                Some(tenant_id()),
            )),
        }
    }
}

#[async_trait]
impl ConfigurationService for StaticConfigurationService {
    async fn get_configuration(
        &self,
        _service_id: &str,
        _token: &str,
        _tenant_id: &TenantId,
    ) -> NotificationResult<Arc<NotificationConfiguration>> {
        Ok(Arc::clone(&self.configuration))
    }
}

pub struct StaticTenantService;

#[async_trait]
impl TenantService for StaticTenantService {
    async fn get_tenant(&self, tenant_id: &TenantId) -> NotificationResult<Tenant> {
        Ok(Tenant {
            id: tenant_id.clone(),
            ..tenant()
        })
    }
}
