use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::NotificationResult,
    models::{
        configuration::NotificationConfiguration,
        message::DlqMessage,
        notification::Notification,
        template::{Message, Template, TemplateContext},
        tenant::{Tenant, TenantId},
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_access_token(&self) -> NotificationResult<String>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigurationService: Send + Sync {
    /// Notification configuration of `service_id` resolved for the tenant.
    async fn get_configuration(
        &self,
        service_id: &str,
        token: &str,
        tenant_id: &TenantId,
    ) -> NotificationResult<Arc<NotificationConfiguration>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantService: Send + Sync {
    async fn get_tenant(&self, tenant_id: &TenantId) -> NotificationResult<Tenant>;
}

pub trait TemplateService: Send + Sync {
    fn generate_message(
        &self,
        template: &Template,
        context: &TemplateContext<'_>,
    ) -> NotificationResult<Message>;
}

/// Outbound sink for rendered notifications. Delivery is at-least-once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn enqueue(&self, notification: &Notification) -> NotificationResult<()>;
}

/// Settlement of consumed event deliveries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    async fn acknowledge(&self, delivery_tag: u64) -> anyhow::Result<()>;

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> anyhow::Result<()>;

    async fn publish_to_dlq(&self, message: &DlqMessage) -> anyhow::Result<()>;
}
