use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    clients::circuit_breaker::CircuitBreaker,
    config::Config,
    error::{NotificationError, NotificationResult},
    models::{
        configuration::{NotificationConfiguration, NotificationTypeDefinitions},
        retry::RetryConfig,
        tenant::TenantId,
    },
    services::ConfigurationService,
    utils::retry_with_backoff,
};

type CacheKey = (String, Option<TenantId>);

struct CachedDocument {
    document: Option<NotificationTypeDefinitions>,
    fetched_at: Instant,
}

/// Reads notification type definitions from the configuration service.
/// Core and tenant documents are cached separately for `cache_ttl`.
pub struct ConfigurationServiceClient {
    http_client: Client,
    base_url: String,
    retry_config: RetryConfig,
    circuit_breaker: Option<CircuitBreaker>,
    cache_ttl: Duration,
    cache: RwLock<HashMap<CacheKey, CachedDocument>>,
}

impl ConfigurationServiceClient {
    pub fn new(config: &Config) -> NotificationResult<Self> {
        Self::with_base_url(
            &config.configuration_service_url,
            config.retry_config(),
            Duration::from_secs(config.configuration_cache_ttl_seconds),
        )
    }

    pub fn with_base_url(
        base_url: &str,
        retry_config: RetryConfig,
        cache_ttl: Duration,
    ) -> NotificationResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                NotificationError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        info!(base_url, "Configuration service client initialized");

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_config,
            circuit_breaker: None,
            cache_ttl,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: CircuitBreaker) -> Self {
        self.circuit_breaker = Some(circuit_breaker);
        self
    }

    /// Drops every cached document of the service, core and tenant.
    pub async fn clear_cached(&self, service_id: &str) {
        self.cache
            .write()
            .await
            .retain(|(cached_service, _), _| cached_service != service_id);

        debug!(service_id, "Cleared cached configuration");
    }

    async fn get_document(
        &self,
        service_id: &str,
        token: &str,
        tenant_id: Option<&TenantId>,
    ) -> NotificationResult<Option<NotificationTypeDefinitions>> {
        let key = (service_id.to_string(), tenant_id.cloned());

        if let Some(cached) = self.cache.read().await.get(&key)
            && cached.fetched_at.elapsed() < self.cache_ttl
        {
            return Ok(cached.document.clone());
        }

        let url = configuration_url(&self.base_url, service_id)?;
        let fetch = || {
            Self::fetch_with_retry(
                self.http_client.clone(),
                self.retry_config.clone(),
                url.clone(),
                token.to_string(),
                tenant_id.cloned(),
            )
        };

        let document = match &self.circuit_breaker {
            Some(circuit_breaker) => circuit_breaker.call(fetch).await,
            None => fetch().await,
        }
        .map_err(|e| NotificationError::Configuration(e.to_string()))?;

        debug!(
            service_id,
            tenant_id = ?tenant_id,
            type_count = document.as_ref().map(HashMap::len).unwrap_or_default(),
            "Fetched notification configuration"
        );

        self.cache.write().await.insert(
            key,
            CachedDocument {
                document: document.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(document)
    }

    async fn fetch_with_retry(
        http_client: Client,
        retry_config: RetryConfig,
        url: String,
        token: String,
        tenant_id: Option<TenantId>,
    ) -> Result<Option<NotificationTypeDefinitions>, Error> {
        retry_with_backoff(&retry_config, || {
            let client = http_client.clone();
            let url = url.clone();
            let token = token.clone();
            let tenant_id = tenant_id.clone();

            async move {
                let mut request = client.get(&url).bearer_auth(&token);
                if let Some(tenant_id) = &tenant_id {
                    request = request.query(&[("tenantId", tenant_id.as_str())]);
                }

                let response = request.send().await.map_err(|e| e.to_string())?;
                let status = response.status();

                if status == StatusCode::NOT_FOUND {
                    return Ok(None);
                }

                if !status.is_success() {
                    return Err(format!("Configuration service returned status {}", status));
                }

                response
                    .json::<Option<NotificationTypeDefinitions>>()
                    .await
                    .map_err(|e| format!("Failed to parse configuration JSON: {}", e))
            }
        })
        .await
        .map_err(|e| anyhow!("Failed to fetch configuration: {}", e))
    }
}

#[async_trait]
impl ConfigurationService for ConfigurationServiceClient {
    async fn get_configuration(
        &self,
        service_id: &str,
        token: &str,
        tenant_id: &TenantId,
    ) -> NotificationResult<Arc<NotificationConfiguration>> {
        let core = self.get_document(service_id, token, None).await?;
        let tenant = self.get_document(service_id, token, Some(tenant_id)).await?;

        Ok(Arc::new(NotificationConfiguration::from_definitions(
            tenant,
            core,
            Some(tenant_id.clone()),
        )))
    }
}

/// `urn:ads:{namespace}:{service}` to the latest-revision endpoint.
pub fn configuration_url(base_url: &str, service_id: &str) -> NotificationResult<String> {
    let mut parts = service_id
        .strip_prefix("urn:ads:")
        .ok_or_else(|| {
            NotificationError::Configuration(format!("Invalid service id: {}", service_id))
        })?
        .split(':');

    match (parts.next(), parts.next()) {
        (Some(namespace), Some(service)) if !namespace.is_empty() && !service.is_empty() => {
            Ok(format!(
                "{}/configuration/v2/configuration/{}/{}/latest",
                base_url, namespace, service
            ))
        }
        _ => Err(NotificationError::Configuration(format!(
            "Invalid service id: {}",
            service_id
        ))),
    }
}
