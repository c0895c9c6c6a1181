use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    config::Config,
    error::{NotificationError, NotificationResult},
    models::{
        retry::RetryConfig,
        tenant::{Tenant, TenantId},
    },
    services::{TenantService, TokenProvider},
    utils::retry_with_backoff,
};

/// Looks up tenants from the tenant service. Tenants rarely change, so
/// successful lookups are kept for the life of the process.
pub struct TenantServiceClient {
    http_client: Client,
    base_url: String,
    retry_config: RetryConfig,
    token_provider: Arc<dyn TokenProvider>,
    tenants: RwLock<HashMap<TenantId, Tenant>>,
}

impl TenantServiceClient {
    pub fn new(config: &Config, token_provider: Arc<dyn TokenProvider>) -> NotificationResult<Self> {
        Self::with_base_url(&config.tenant_service_url, config.retry_config(), token_provider)
    }

    pub fn with_base_url(
        base_url: &str,
        retry_config: RetryConfig,
        token_provider: Arc<dyn TokenProvider>,
    ) -> NotificationResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotificationError::Tenant(format!("Failed to create HTTP client: {}", e)))?;

        info!(base_url, "Tenant service client initialized");

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_config,
            token_provider,
            tenants: RwLock::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl TenantService for TenantServiceClient {
    async fn get_tenant(&self, tenant_id: &TenantId) -> NotificationResult<Tenant> {
        if let Some(tenant) = self.tenants.read().await.get(tenant_id) {
            return Ok(tenant.clone());
        }

        let token = self.token_provider.get_access_token().await?;
        let url = format!(
            "{}/api/tenant/v2/tenants/{}",
            self.base_url,
            tenant_id.resource_id()
        );

        let this = self;
        let tenant = retry_with_backoff(&self.retry_config, || {
            let url = url.clone();
            let token = token.clone();

            async move {
                let response = this
                    .http_client
                    .get(&url)
                    .bearer_auth(&token)
                    .send()
                    .await
                    .map_err(|e| e.to_string())?;

                match response.status() {
                    StatusCode::NOT_FOUND => Ok(None),
                    status if status.is_success() => response
                        .json::<Tenant>()
                        .await
                        .map(Some)
                        .map_err(|e| format!("Failed to parse tenant JSON: {}", e)),
                    status => Err(format!("Tenant service returned status {}", status)),
                }
            }
        })
        .await
        .map_err(NotificationError::Tenant)?
        .ok_or_else(|| NotificationError::Tenant(format!("Tenant {} not found", tenant_id)))?;

        debug!(tenant_id = %tenant_id, tenant_name = %tenant.name, "Tenant resolved");

        self.tenants
            .write()
            .await
            .insert(tenant_id.clone(), tenant.clone());

        Ok(tenant)
    }
}
