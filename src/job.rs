use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    error::{NotificationError, NotificationResult},
    models::{event::DomainEvent, notification_type::NotificationType, tenant::Tenant},
    repository::SubscriptionRepository,
    services::{
        ConfigurationService, NotificationQueue, TemplateService, TenantService, TokenProvider,
    },
};

pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// Collaborators of the event processing job.
pub struct JobDependencies {
    pub service_id: String,
    pub token_provider: Arc<dyn TokenProvider>,
    pub configuration_service: Arc<dyn ConfigurationService>,
    pub tenant_service: Arc<dyn TenantService>,
    pub template_service: Arc<dyn TemplateService>,
    pub subscription_repository: Arc<dyn SubscriptionRepository>,
    pub queue: Arc<dyn NotificationQueue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessSummary {
    /// Notifications generated per type id, in processing order.
    pub types: Vec<(String, usize)>,
}

impl ProcessSummary {
    pub fn generated(&self) -> usize {
        self.types.iter().map(|(_, count)| count).sum()
    }
}

/// Turns one domain event into enqueued notifications for every matching
/// subscription of every notification type bound to it.
///
/// The job never retries. A failure part way through leaves earlier
/// notifications enqueued; redelivery is up to the hosting queue.
pub struct ProcessEventJob {
    dependencies: JobDependencies,
    page_size: usize,
    max_pages: usize,
}

impl ProcessEventJob {
    pub fn new(dependencies: JobDependencies) -> Self {
        Self {
            dependencies,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_paging(mut self, page_size: usize, max_pages: usize) -> Self {
        self.page_size = page_size.max(1);
        self.max_pages = max_pages.max(1);
        self
    }

    /// Processes the event and reports the outcome through `done`: `None` on
    /// success, the error otherwise.
    pub async fn execute<F>(&self, event: &DomainEvent, done: F)
    where
        F: FnOnce(Option<NotificationError>),
    {
        match self.process(event).await {
            Ok(_) => done(None),
            Err(e) => {
                warn!(
                    tenant_id = %event.tenant_id,
                    event = %event.key(),
                    error = %e,
                    "Error encountered on processing event"
                );
                done(Some(e));
            }
        }
    }

    pub async fn process(&self, event: &DomainEvent) -> NotificationResult<ProcessSummary> {
        let span = info_span!(
            "process_event",
            tenant_id = %event.tenant_id,
            event = %event.key()
        );

        self.process_event(event).instrument(span).await
    }

    async fn process_event(&self, event: &DomainEvent) -> NotificationResult<ProcessSummary> {
        let deps = &self.dependencies;
        debug!("Processing event");

        let token = deps.token_provider.get_access_token().await?;
        let configuration = deps
            .configuration_service
            .get_configuration(&deps.service_id, &token, &event.tenant_id)
            .await?;

        let types = configuration.get_event_notification_types(event);
        let mut summary = ProcessSummary::default();

        if types.is_empty() {
            debug!("No notification types bound to event");
            return Ok(summary);
        }

        let tenant = deps.tenant_service.get_tenant(&event.tenant_id).await?;

        for notification_type in types {
            let count = self.process_type(notification_type, &tenant, event).await?;

            debug!(
                type_id = %notification_type.id(),
                type_name = %notification_type.name(),
                count,
                "Generated notifications for type"
            );

            summary
                .types
                .push((notification_type.id().to_string(), count));
        }

        let generated = summary.generated();
        if generated > 0 {
            info!(count = generated, "Generated notifications for event");
        } else {
            debug!("Processed event with no notifications generated");
        }

        Ok(summary)
    }

    /// Pages through every subscription of the type, enqueueing each page's
    /// notifications before the next page is requested.
    async fn process_type(
        &self,
        notification_type: &NotificationType,
        tenant: &Tenant,
        event: &DomainEvent,
    ) -> NotificationResult<usize> {
        let deps = &self.dependencies;
        let mut after: Option<String> = None;
        let mut pages = 0;
        let mut count = 0;

        loop {
            let page = deps
                .subscription_repository
                .get_subscriptions(notification_type, self.page_size, after.take())
                .await?;
            pages += 1;

            let notifications = notification_type.generate_notifications(
                deps.template_service.as_ref(),
                tenant,
                event,
                &page.results,
            )?;

            for notification in &notifications {
                deps.queue.enqueue(notification).await?;
            }
            count += notifications.len();

            match page.page.next {
                None => break,
                Some(_) if pages >= self.max_pages => {
                    return Err(NotificationError::PageLimitExceeded {
                        type_id: notification_type.id().to_string(),
                        max_pages: self.max_pages,
                    });
                }
                Some(next) => after = Some(next),
            }
        }

        Ok(count)
    }
}
