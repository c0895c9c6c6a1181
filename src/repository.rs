use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::NotificationResult,
    models::{notification_type::NotificationType, subscription::Subscription, tenant::TenantId},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// Cursor for the following page; `None` on the last page.
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPage {
    pub results: Vec<Subscription>,
    pub page: PageInfo,
}

/// Storage of subscriptions and their subscribers.
///
/// At most one subscription exists per (tenant, type, subscriber); saving an
/// existing one replaces its criteria.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Subscriptions of the type within the type's tenant, with subscribers
    /// loaded, ordered for stable cursor paging.
    async fn get_subscriptions(
        &self,
        notification_type: &NotificationType,
        top: usize,
        after: Option<String>,
    ) -> NotificationResult<SubscriptionPage>;

    async fn save_subscription(&self, subscription: Subscription) -> NotificationResult<Subscription>;

    async fn delete_subscriptions(
        &self,
        tenant_id: &TenantId,
        type_id: &str,
        subscriber_id: &str,
    ) -> NotificationResult<bool>;
}
