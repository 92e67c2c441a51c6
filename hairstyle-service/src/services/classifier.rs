//! Maps provider failures to client-facing error semantics.

use crate::services::providers::ProviderError;
use service_core::error::AppError;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RateLimited,
    Forbidden,
    InvalidRequest,
    Unknown,
}

impl ErrorKind {
    /// Kind for a provider status code. Failures without a status are `Unknown`.
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(429) => ErrorKind::RateLimited,
            Some(403) => ErrorKind::Forbidden,
            Some(400) => ErrorKind::InvalidRequest,
            _ => ErrorKind::Unknown,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::RateLimited => 429,
            ErrorKind::Forbidden => 403,
            ErrorKind::InvalidRequest => 400,
            ErrorKind::Unknown => 500,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "API rate limit exceeded. Please wait a moment and try again.",
            ErrorKind::Forbidden => "API access denied. Please check your API key and permissions.",
            ErrorKind::InvalidRequest => "Invalid request sent to the AI service.",
            ErrorKind::Unknown => "Failed to analyze hairstyle",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Unknown => "unknown",
        }
    }
}

/// True when waiting and retrying may help.
pub fn is_transient(error: &ProviderError) -> bool {
    ErrorKind::from_status(error.status_code()) == ErrorKind::RateLimited
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub http_status: u16,
    pub retry_after_hint: Option<Duration>,
    pub message: &'static str,
    /// Underlying provider error, for the `details` field.
    pub details: String,
}

/// Classifies provider failures. Holds the rate-limit hint from config.
#[derive(Debug, Clone, Copy)]
pub struct ErrorClassifier {
    rate_limit_hint: Duration,
}

impl ErrorClassifier {
    pub fn new(rate_limit_hint: Duration) -> Self {
        Self { rate_limit_hint }
    }

    pub fn classify(&self, error: &ProviderError) -> ClassifiedError {
        let kind = ErrorKind::from_status(error.status_code());

        ClassifiedError {
            kind,
            http_status: kind.http_status(),
            retry_after_hint: (kind == ErrorKind::RateLimited).then_some(self.rate_limit_hint),
            message: kind.message(),
            details: error.to_string(),
        }
    }
}

impl From<ClassifiedError> for AppError {
    fn from(err: ClassifiedError) -> Self {
        let message = err.message.to_string();
        let details = err.details;

        match err.kind {
            ErrorKind::RateLimited => AppError::TooManyRequests {
                message,
                details,
                retry_after: err.retry_after_hint.map(|d| d.as_secs()),
            },
            ErrorKind::Forbidden => AppError::Forbidden { message, details },
            ErrorKind::InvalidRequest => AppError::InvalidRequest { message, details },
            ErrorKind::Unknown => AppError::UpstreamFailure { message, details },
        }
    }
}
