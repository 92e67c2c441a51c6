use crate::services::metrics;
use axum::{http::header, response::IntoResponse};
use service_core::error::AppError;

pub async fn metrics_handler() -> Result<impl IntoResponse, AppError> {
    let body = metrics::gather()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode metrics: {}", e)))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
