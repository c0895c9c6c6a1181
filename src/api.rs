use std::sync::Arc;

use anyhow::{Error, Result};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{clients::health::HealthChecker, config::Config, models::health::HealthStatus};

/// Liveness surface of the dispatcher. Degraded dependencies still report
/// 200 so the worker keeps its slot while a breaker is open.
pub fn router(health_checker: HealthChecker) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(health_checker))
}

pub async fn run_api_server(config: Config) -> Result<(), Error> {
    let app = router(HealthChecker::new(config.clone()));

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "Health endpoint listening");

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn status_code(status: HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn health(State(checker): State<Arc<HealthChecker>>) -> impl IntoResponse {
    let report = checker.check_all().await;

    (status_code(report.status), Json(report))
}
