use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    /// The upstream dependency rejected the request as malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String, details: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String, details: String },

    #[error("Too many requests: {message}")]
    TooManyRequests {
        message: String,
        details: String,
        retry_after: Option<u64>,
    },

    /// A dependency failed in a way we could not classify.
    #[error("Upstream failure: {message}")]
    UpstreamFailure { message: String, details: String },

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::UpstreamFailure { .. }
            | AppError::InternalError(_)
            | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match self {
            AppError::BadRequest(err) => ErrorResponse {
                error: err.to_string(),
                details: None,
                retry_after: None,
            },
            AppError::InvalidRequest { message, details }
            | AppError::Forbidden { message, details }
            | AppError::UpstreamFailure { message, details } => ErrorResponse {
                error: message,
                details: Some(details),
                retry_after: None,
            },
            AppError::TooManyRequests {
                message,
                details,
                retry_after,
            } => ErrorResponse {
                error: message,
                details: Some(details),
                retry_after,
            },
            AppError::InternalError(err) => ErrorResponse {
                error: "Internal server error".to_string(),
                details: Some(format!("{:#}", err)),
                retry_after: None,
            },
            AppError::ConfigError(err) => ErrorResponse {
                error: "Configuration error".to_string(),
                details: Some(err.to_string()),
                retry_after: None,
            },
        };

        let retry_after = body.retry_after;
        let mut res = (status, Json(body)).into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }

        res
    }
}
