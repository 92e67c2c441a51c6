//! AI provider abstractions and implementations.
//!
//! The analyzer talks to a [`VisionProvider`] so the Gemini backend can be
//! swapped for a scripted mock in tests.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// The provider answered with a non-success HTTP status.
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Empty response: {0}")]
    EmptyResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// HTTP status reported by the provider, when there was one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::RateLimited(_) => Some(429),
            ProviderError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result of a provider response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Generated text, as returned by the model.
    pub text: String,

    /// Input tokens consumed.
    pub input_tokens: i32,

    /// Output tokens generated.
    pub output_tokens: i32,

    /// Finish reason.
    pub finish_reason: FinishReason,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
}

/// Sampling parameters for a generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub top_k: Option<i32>,
    pub top_p: Option<f32>,
    pub max_output_tokens: Option<i32>,
}

/// Image bytes already encoded for transport.
#[derive(Debug, Clone)]
pub struct InlineImage {
    /// Base64-encoded image bytes.
    pub data: String,
    pub mime_type: String,
}

/// Trait for multimodal (text + image) generation providers.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Generate text from a prompt and a single image.
    async fn generate(
        &self,
        prompt: &str,
        image: &InlineImage,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Model identifier, for logs and metrics.
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code() {
        assert_eq!(
            ProviderError::RateLimited("quota".into()).status_code(),
            Some(429)
        );
        assert_eq!(
            ProviderError::ApiError {
                status: 403,
                message: "denied".into()
            }
            .status_code(),
            Some(403)
        );
        assert_eq!(
            ProviderError::NetworkError("reset".into()).status_code(),
            None
        );
        assert_eq!(ProviderError::ContentFiltered.status_code(), None);
    }
}
