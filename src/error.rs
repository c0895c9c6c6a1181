use thiserror::Error;

pub type NotificationResult<T> = Result<T, NotificationError>;

#[derive(Debug, Error)]
pub enum NotificationError {
    /// Caller is not allowed to manage the subscription. Never retried.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid notification type definition: {0}")]
    InvalidDefinition(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Access token error: {0}")]
    Token(String),

    #[error("Tenant error: {0}")]
    Tenant(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Subscription paging for type {type_id} exceeded {max_pages} pages")]
    PageLimitExceeded { type_id: String, max_pages: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NotificationError {
    /// Client errors are surfaced to the caller and must not be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            NotificationError::Unauthorized(_) | NotificationError::InvalidDefinition(_)
        )
    }
}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        NotificationError::Serialization(err.to_string())
    }
}

impl From<tokio_postgres::Error> for NotificationError {
    fn from(err: tokio_postgres::Error) -> Self {
        NotificationError::Repository(err.to_string())
    }
}

impl From<lapin::Error> for NotificationError {
    fn from(err: lapin::Error) -> Self {
        NotificationError::Queue(err.to_string())
    }
}

impl From<handlebars::RenderError> for NotificationError {
    fn from(err: handlebars::RenderError) -> Self {
        NotificationError::Template(err.to_string())
    }
}

impl From<handlebars::TemplateError> for NotificationError {
    fn from(err: handlebars::TemplateError) -> Self {
        NotificationError::Template(err.to_string())
    }
}
