use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    config::Config,
    error::{NotificationError, NotificationResult},
    models::retry::RetryConfig,
    services::TokenProvider,
    utils::retry_with_backoff,
};

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN_SECONDS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    300
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// OAuth2 client-credentials token provider for calls to platform services.
pub struct AccessTokenClient {
    http_client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    retry_config: RetryConfig,
    cached: Mutex<Option<CachedToken>>,
}

impl AccessTokenClient {
    pub fn new(config: &Config) -> NotificationResult<Self> {
        Self::with_credentials(
            &config.access_token_url,
            &config.client_id,
            &config.client_secret,
            config.retry_config(),
        )
    }

    pub fn with_credentials(
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        retry_config: RetryConfig,
    ) -> NotificationResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotificationError::Token(format!("Failed to create HTTP client: {}", e)))?;

        info!(token_url, client_id, "Access token client initialized");

        Ok(Self {
            http_client,
            token_url: token_url.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            retry_config,
            cached: Mutex::new(None),
        })
    }

    async fn request_token(&self) -> NotificationResult<TokenResponse> {
        let this = self;

        retry_with_backoff(&self.retry_config, || async move {
            let response = this
                .http_client
                .post(&this.token_url)
                .form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", this.client_id.as_str()),
                    ("client_secret", this.client_secret.as_str()),
                ])
                .send()
                .await
                .map_err(|e| e.to_string())?;

            let status = response.status();
            if !status.is_success() {
                return Err(format!("Token endpoint returned status {}", status));
            }

            response
                .json::<TokenResponse>()
                .await
                .map_err(|e| format!("Failed to parse token response: {}", e))
        })
        .await
        .map_err(NotificationError::Token)
    }
}

#[async_trait]
impl TokenProvider for AccessTokenClient {
    async fn get_access_token(&self) -> NotificationResult<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref()
            && token.expires_at > Utc::now()
        {
            return Ok(token.value.clone());
        }

        let response = self.request_token().await?;
        let lifetime = (response.expires_in - EXPIRY_MARGIN_SECONDS).max(0);
        let expires_at = Utc::now() + chrono::Duration::seconds(lifetime);

        debug!(expires_at = %expires_at, "Access token refreshed");

        *cached = Some(CachedToken {
            value: response.access_token.clone(),
            expires_at,
        });

        Ok(response.access_token)
    }
}
