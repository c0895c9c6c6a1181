use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use chrono::{SecondsFormat, Utc};
use futures_util::StreamExt;
use lapin::message::Delivery;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::{
    clients::{configuration::ConfigurationServiceClient, rbmq::RabbitMqClient},
    error::NotificationError,
    job::ProcessEventJob,
    models::{event::DomainEvent, message::DlqMessage},
    services::DeliveryQueue,
};

const CONFIGURATION_NAMESPACE: &str = "configuration-service";
const CONFIGURATION_UPDATED: &str = "configuration-updated";

/// What to do with a delivery once its event has been handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Ack,
    Requeue,
    DeadLetter(String),
}

/// First failures are requeued once; redelivered or non-retryable failures
/// go to the failed queue.
pub fn delivery_outcome(failure: Option<&NotificationError>, redelivered: bool) -> DeliveryOutcome {
    match failure {
        None => DeliveryOutcome::Ack,
        Some(e) if e.is_retryable() && !redelivered => DeliveryOutcome::Requeue,
        Some(e) => DeliveryOutcome::DeadLetter(e.to_string()),
    }
}

/// Publishes the message to the failed queue, then acks the delivery. When
/// the publish fails the delivery is requeued so the event is not lost.
pub async fn settle_dead_letter(
    queue: &dyn DeliveryQueue,
    delivery_tag: u64,
    message: &DlqMessage,
) -> Result<(), Error> {
    if let Err(e) = queue.publish_to_dlq(message).await {
        error!(delivery_tag, error = %e, "Failed to publish to failed queue, requeueing");
        queue.reject(delivery_tag, true).await?;
        return Err(e);
    }

    queue.acknowledge(delivery_tag).await?;

    warn!(
        delivery_tag,
        reason = %message.failure_reason,
        "Event moved to failed queue"
    );

    Ok(())
}

/// Consumes domain events from the event queue and runs the processing job
/// for each of them.
pub struct EventWorker {
    job: Arc<ProcessEventJob>,
    rabbitmq: Arc<RabbitMqClient>,
    configuration_client: Option<Arc<ConfigurationServiceClient>>,
    service_id: String,
    concurrency: usize,
}

impl EventWorker {
    pub fn new(
        job: Arc<ProcessEventJob>,
        rabbitmq: Arc<RabbitMqClient>,
        service_id: impl Into<String>,
        concurrency: usize,
    ) -> Self {
        Self {
            job,
            rabbitmq,
            configuration_client: None,
            service_id: service_id.into(),
            concurrency: concurrency.max(1),
        }
    }

    /// Cached configuration of this service is dropped when the
    /// configuration service reports an update to it.
    pub fn with_configuration_cache(mut self, client: Arc<ConfigurationServiceClient>) -> Self {
        self.configuration_client = Some(client);
        self
    }

    pub async fn run(self) -> Result<(), Error> {
        let mut consumer = self.rabbitmq.create_consumer().await?;
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let worker = Arc::new(self);

        info!(concurrency = worker.concurrency, "Event worker started");

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(delivery) => delivery,
                Err(e) => {
                    error!(error = %e, "Failed to receive delivery");
                    continue;
                }
            };

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| anyhow!("Worker semaphore closed: {}", e))?;
            let worker = Arc::clone(&worker);

            tokio::spawn(async move {
                if let Err(e) = worker.handle_delivery(delivery).await {
                    error!(error = %e, "Failed to settle delivery");
                }
                drop(permit);
            });
        }

        warn!("Event consumer stream ended");
        Ok(())
    }

    async fn handle_delivery(&self, delivery: Delivery) -> Result<(), Error> {
        let delivery_tag = delivery.delivery_tag;
        let payload = String::from_utf8_lossy(&delivery.data).into_owned();

        let event: DomainEvent = match serde_json::from_str(&payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(delivery_tag, error = %e, "Undecodable event payload");
                let reason = format!("Invalid event payload: {}", e);
                return self
                    .dead_letter(delivery_tag, payload, reason, delivery.redelivered)
                    .await;
            }
        };

        debug!(
            delivery_tag,
            tenant_id = %event.tenant_id,
            event = %event.key(),
            redelivered = delivery.redelivered,
            "Received event"
        );

        self.invalidate_configuration(&event).await;

        let mut failure = None;
        self.job.execute(&event, |error| failure = error).await;

        match delivery_outcome(failure.as_ref(), delivery.redelivered) {
            DeliveryOutcome::Ack => self.rabbitmq.acknowledge(delivery_tag).await,
            DeliveryOutcome::Requeue => {
                info!(delivery_tag, event = %event.key(), "Requeueing failed event");
                self.rabbitmq.reject(delivery_tag, true).await
            }
            DeliveryOutcome::DeadLetter(reason) => {
                self.dead_letter(delivery_tag, payload, reason, delivery.redelivered)
                    .await
            }
        }
    }

    async fn dead_letter(
        &self,
        delivery_tag: u64,
        payload: String,
        reason: String,
        redelivered: bool,
    ) -> Result<(), Error> {
        let message = DlqMessage {
            original_payload: payload,
            failure_reason: reason,
            failed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            redelivered,
        };

        settle_dead_letter(self.rabbitmq.as_ref(), delivery_tag, &message).await
    }

    async fn invalidate_configuration(&self, event: &DomainEvent) {
        let Some(client) = &self.configuration_client else {
            return;
        };

        if !event.is(CONFIGURATION_NAMESPACE, CONFIGURATION_UPDATED) {
            return;
        }

        let namespace = event.payload.get("namespace").and_then(|v| v.as_str());
        let name = event.payload.get("name").and_then(|v| v.as_str());

        if let (Some(namespace), Some(name)) = (namespace, name)
            && self.service_id == format!("urn:ads:{}:{}", namespace, name)
        {
            info!(tenant_id = %event.tenant_id, "Configuration updated, clearing cache");
            client.clear_cached(&self.service_id).await;
        }
    }
}
