use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use tokio_postgres::{Client, NoTls, Row, types::Json};
use tracing::{debug, error, info};

use crate::{
    error::{NotificationError, NotificationResult},
    models::{
        notification_type::NotificationType,
        subscriber::{Subscriber, SubscriberChannel},
        subscription::{Subscription, SubscriptionCriteria},
        tenant::TenantId,
    },
    repository::{PageInfo, SubscriptionPage, SubscriptionRepository},
};

const SCHEMA: &str = include_str!("../../migrations/001_subscriptions.sql");

const SELECT_SUBSCRIPTIONS: &str = r#"
    SELECT s.tenant_id, s.type_id, s.subscriber_id, s.criteria,
           sb.urn, sb.user_id, sb.address_as, sb.channels
    FROM subscriptions s
    JOIN subscribers sb ON sb.id = s.subscriber_id AND sb.tenant_id = s.tenant_id
    WHERE s.tenant_id = $1
      AND s.type_id = $2
      AND ($3::text IS NULL OR s.subscriber_id > $3)
    ORDER BY s.subscriber_id
    LIMIT $4
"#;

/// Postgres subscription store. Pages are keyed on subscriber id, so the
/// `after` cursor is the last subscriber id of the previous page.
pub struct DatabaseClient {
    client: Client,
}

impl DatabaseClient {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection closed with error");
            }
        });

        info!("PostgreSQL connection established");

        Ok(Self { client })
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        self.client
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| anyhow!("Failed to apply database schema: {}", e))?;

        info!("Database schema applied");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepository for DatabaseClient {
    async fn get_subscriptions(
        &self,
        notification_type: &NotificationType,
        top: usize,
        after: Option<String>,
    ) -> NotificationResult<SubscriptionPage> {
        let tenant_id = notification_type.tenant_id().ok_or_else(|| {
            NotificationError::Repository(format!(
                "Notification type {} is not resolved for a tenant",
                notification_type.id()
            ))
        })?;

        // One extra row tells whether another page follows.
        let limit = top as i64 + 1;
        let rows = self
            .client
            .query(
                SELECT_SUBSCRIPTIONS,
                &[&tenant_id.as_str(), &notification_type.id(), &after, &limit],
            )
            .await?;

        let mut results = rows
            .iter()
            .map(subscription_from_row)
            .collect::<NotificationResult<Vec<_>>>()?;

        let next = if results.len() > top {
            results.truncate(top);
            results.last().map(|subscription| subscription.subscriber_id.clone())
        } else {
            None
        };

        debug!(
            tenant_id = %tenant_id,
            type_id = %notification_type.id(),
            count = results.len(),
            has_next = next.is_some(),
            "Loaded subscription page"
        );

        Ok(SubscriptionPage {
            results,
            page: PageInfo { next },
        })
    }

    async fn save_subscription(&self, subscription: Subscription) -> NotificationResult<Subscription> {
        let criteria = Json(&subscription.criteria);

        self.client
            .execute(
                r#"
                INSERT INTO subscriptions (tenant_id, type_id, subscriber_id, criteria)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (tenant_id, type_id, subscriber_id)
                DO UPDATE SET criteria = EXCLUDED.criteria
                "#,
                &[
                    &subscription.tenant_id.as_str(),
                    &subscription.type_id,
                    &subscription.subscriber_id,
                    &criteria,
                ],
            )
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    type_id = %subscription.type_id,
                    subscriber_id = %subscription.subscriber_id,
                    "Failed to save subscription"
                );
                NotificationError::from(e)
            })?;

        debug!(
            tenant_id = %subscription.tenant_id,
            type_id = %subscription.type_id,
            subscriber_id = %subscription.subscriber_id,
            "Subscription saved"
        );

        Ok(subscription)
    }

    async fn delete_subscriptions(
        &self,
        tenant_id: &TenantId,
        type_id: &str,
        subscriber_id: &str,
    ) -> NotificationResult<bool> {
        let deleted = self
            .client
            .execute(
                "DELETE FROM subscriptions WHERE tenant_id = $1 AND type_id = $2 AND subscriber_id = $3",
                &[&tenant_id.as_str(), &type_id, &subscriber_id],
            )
            .await?;

        debug!(
            tenant_id = %tenant_id,
            type_id,
            subscriber_id,
            deleted,
            "Subscriptions deleted"
        );

        Ok(deleted > 0)
    }
}

fn subscription_from_row(row: &Row) -> NotificationResult<Subscription> {
    let tenant_id = TenantId::new(row.try_get::<_, String>("tenant_id")?);
    let subscriber_id: String = row.try_get("subscriber_id")?;
    let Json(criteria) = row.try_get::<_, Json<SubscriptionCriteria>>("criteria")?;
    let Json(channels) = row.try_get::<_, Json<Vec<SubscriberChannel>>>("channels")?;

    let subscriber = Subscriber {
        id: subscriber_id.clone(),
        tenant_id: tenant_id.clone(),
        urn: row.try_get("urn")?,
        user_id: row.try_get("user_id")?,
        address_as: row.try_get("address_as")?,
        channels,
    };

    Ok(Subscription {
        tenant_id,
        type_id: row.try_get("type_id")?,
        subscriber_id,
        criteria,
        subscriber: Some(subscriber),
    })
}
