use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
        BasicRejectOptions, QueueDeclareOptions,
    },
    types::FieldTable,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{NotificationError, NotificationResult},
    models::{message::DlqMessage, notification::Notification},
    services::{DeliveryQueue, NotificationQueue},
};

const PERSISTENT: u8 = 2;

pub struct RabbitMqClient {
    channel: Channel,
    event_queue_name: String,
    notification_queue_name: String,
    failed_queue_name: String,
}

impl RabbitMqClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        info!("Connecting to RabbitMQ");

        let connection = Connection::connect(&config.rabbitmq_url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| anyhow!("RabbitMQ channel creation failed: {}", e))?;

        channel
            .basic_qos(config.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to set up QoS: {}", e))?;

        for queue in [
            &config.event_queue_name,
            &config.notification_queue_name,
            &config.failed_queue_name,
        ] {
            channel
                .queue_declare(
                    queue,
                    QueueDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| anyhow!("Failed to declare queue {}: {}", queue, e))?;

            debug!(queue = %queue, "Queue declared");
        }

        info!(
            prefetch_count = config.prefetch_count,
            event_queue = %config.event_queue_name,
            notification_queue = %config.notification_queue_name,
            "RabbitMQ channel ready"
        );

        Ok(Self {
            channel,
            event_queue_name: config.event_queue_name.clone(),
            notification_queue_name: config.notification_queue_name.clone(),
            failed_queue_name: config.failed_queue_name.clone(),
        })
    }

    pub async fn create_consumer(&self) -> Result<Consumer, Error> {
        let consumer_tag = format!("notification-event-worker-{}", Uuid::new_v4());
        let consumer = self
            .channel
            .basic_consume(
                &self.event_queue_name,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to create consumer: {}", e))?;

        info!(queue = %self.event_queue_name, consumer_tag = %consumer_tag, "Consumer created");

        Ok(consumer)
    }
}

#[async_trait]
impl DeliveryQueue for RabbitMqClient {
    async fn acknowledge(&self, delivery_tag: u64) -> Result<(), Error> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to acknowledge message: {}", e))?;

        Ok(())
    }

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error> {
        self.channel
            .basic_reject(delivery_tag, BasicRejectOptions { requeue })
            .await
            .map_err(|e| anyhow!("Failed to reject message: {}", e))?;

        Ok(())
    }

    async fn publish_to_dlq(&self, message: &DlqMessage) -> Result<(), Error> {
        let payload = serde_json::to_vec(message)?;

        self.channel
            .basic_publish(
                "",
                &self.failed_queue_name,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(PERSISTENT),
            )
            .await
            .map_err(|e| anyhow!("Failed to publish message to dlq: {}", e))?
            .await
            .map_err(|e| anyhow!("Dead letter publish was not confirmed: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl NotificationQueue for RabbitMqClient {
    async fn enqueue(&self, notification: &Notification) -> NotificationResult<()> {
        let payload = serde_json::to_vec(notification)?;
        let message_id = Uuid::new_v4().to_string();

        self.channel
            .basic_publish(
                "",
                &self.notification_queue_name,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_delivery_mode(PERSISTENT)
                    .with_content_type("application/json".into())
                    .with_message_id(message_id.as_str().into()),
            )
            .await?
            .await
            .map_err(|e| NotificationError::Queue(format!("Publish was not confirmed: {}", e)))?;

        debug!(
            message_id = %message_id,
            type_id = %notification.notification_type.id,
            channel = %notification.channel,
            "Notification enqueued"
        );

        Ok(())
    }
}
