use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use notification_service::{
    api::run_api_server,
    clients::{
        circuit_breaker::CircuitBreaker, configuration::ConfigurationServiceClient,
        database::DatabaseClient, health::CONFIGURATION_SERVICE, rbmq::RabbitMqClient,
        template::HandlebarsTemplateService, tenant::TenantServiceClient,
        token::AccessTokenClient,
    },
    config::Config,
    job::{JobDependencies, ProcessEventJob},
    services::TokenProvider,
    worker::EventWorker,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::load()?;

    let database = DatabaseClient::connect(&config.database_url).await?;
    database.migrate().await?;

    let redis_connection = redis::Client::open(config.redis_url.as_str())?
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| anyhow!("Failed to connect to Redis: {}", e))?;
    let circuit_breaker = CircuitBreaker::new(
        CONFIGURATION_SERVICE,
        redis_connection,
        config.circuit_breaker_config(),
    );

    let rabbitmq = Arc::new(RabbitMqClient::connect(&config).await?);

    let token_provider: Arc<dyn TokenProvider> = Arc::new(AccessTokenClient::new(&config)?);
    let configuration_client =
        Arc::new(ConfigurationServiceClient::new(&config)?.with_circuit_breaker(circuit_breaker));
    let tenant_client = TenantServiceClient::new(&config, Arc::clone(&token_provider))?;

    let job = ProcessEventJob::new(JobDependencies {
        service_id: config.service_id.clone(),
        token_provider,
        configuration_service: configuration_client.clone(),
        tenant_service: Arc::new(tenant_client),
        template_service: Arc::new(HandlebarsTemplateService::new()),
        subscription_repository: Arc::new(database),
        queue: rabbitmq.clone(),
    })
    .with_paging(config.subscription_page_size, config.max_subscription_pages);

    let api_config = config.clone();
    tokio::spawn(async move {
        if let Err(e) = run_api_server(api_config).await {
            error!(error = %e, "Health check server stopped");
        }
    });

    info!(service_id = %config.service_id, "Notification service starting");

    EventWorker::new(
        Arc::new(job),
        rabbitmq,
        config.service_id.clone(),
        config.worker_concurrency,
    )
    .with_configuration_cache(configuration_client)
    .run()
    .await
}
