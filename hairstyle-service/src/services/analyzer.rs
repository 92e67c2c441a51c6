//! End-to-end orchestration of one hairstyle analysis.
//!
//! Received → Encoding → Calling(1..N) → Normalizing → Done, or
//! Calling → Classifying → Failed. Scratch storage is released on both paths.

use crate::config::HairstyleConfig;
use crate::models::{AnalysisReport, AnalysisRequest};
use crate::services::classifier::{self, ClassifiedError, ErrorClassifier};
use crate::services::metrics;
use crate::services::normalizer;
use crate::services::providers::{
    GenerationParams, InlineImage, ProviderResponse, VisionProvider,
};
use crate::services::scratch::{ScratchError, ScratchImage};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use service_core::error::AppError;
use service_core::retry::{BackoffExecutor, Sleeper};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Scratch(#[from] ScratchError),

    #[error("{}: {}", .0.message, .0.details)]
    Provider(ClassifiedError),
}

impl AnalysisError {
    /// Label for request metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            AnalysisError::Scratch(_) => "internal",
            AnalysisError::Provider(classified) => classified.kind.as_str(),
        }
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Scratch(e) => AppError::InternalError(anyhow::Error::new(e)),
            AnalysisError::Provider(classified) => classified.into(),
        }
    }
}

pub struct HairstyleAnalyzer {
    provider: Arc<dyn VisionProvider>,
    executor: BackoffExecutor,
    classifier: ErrorClassifier,
    prompt: String,
    params: GenerationParams,
    scratch_dir: PathBuf,
}

impl HairstyleAnalyzer {
    pub fn new(
        config: &HairstyleConfig,
        provider: Arc<dyn VisionProvider>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            provider,
            executor: BackoffExecutor::with_sleeper(config.retry.clone(), sleeper),
            classifier: ErrorClassifier::new(config.rate_limit_retry_after),
            prompt: config.prompt.clone(),
            params: GenerationParams {
                temperature: Some(config.generation.temperature),
                top_k: Some(config.generation.top_k),
                top_p: Some(config.generation.top_p),
                max_output_tokens: Some(config.generation.max_output_tokens),
            },
            scratch_dir: config.upload.scratch_dir.clone(),
        }
    }

    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisReport, AnalysisError> {
        let started = Instant::now();
        let AnalysisRequest { image, mime_type } = request;

        tracing::info!(
            stage = "received",
            mime_type = %mime_type,
            size = image.len(),
            "Hairstyle analysis started"
        );

        let scratch = ScratchImage::stage(&self.scratch_dir, image).await?;

        tracing::debug!(stage = "encoding", "Encoding image for provider");
        let inline = InlineImage {
            data: BASE64.encode(scratch.read().await?),
            mime_type,
        };

        let outcome = self.call_provider(&inline).await;
        scratch.release().await;

        let response = outcome.map_err(|classified| {
            tracing::warn!(
                stage = "failed",
                kind = classified.kind.as_str(),
                http_status = classified.http_status,
                details = %classified.details,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Hairstyle analysis failed"
            );
            AnalysisError::Provider(classified)
        })?;

        tracing::debug!(stage = "normalizing", "Normalizing model output");
        let (analysis, path) = normalizer::normalize_with_path(&response.text);
        metrics::record_normalization(path.as_str());

        tracing::info!(
            stage = "done",
            normalization = path.as_str(),
            suggestions = analysis.suggestions.len(),
            finish_reason = ?response.finish_reason,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Hairstyle analysis completed"
        );

        Ok(AnalysisReport::new(analysis, response.text))
    }

    /// Run the provider call through the backoff executor and classify any
    /// final failure.
    async fn call_provider(
        &self,
        image: &InlineImage,
    ) -> Result<ProviderResponse, ClassifiedError> {
        let attempts = AtomicU32::new(0);
        let attempts_ref = &attempts;
        let provider = self.provider.as_ref();
        let prompt = self.prompt.as_str();
        let params = &self.params;
        let errors = &self.classifier;

        let result = self
            .executor
            .execute("generate_content", classifier::is_transient, move || async move {
                let attempt = attempts_ref.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::debug!(
                    stage = "calling",
                    attempt,
                    model = provider.model(),
                    "Calling AI provider"
                );

                let call_started = Instant::now();
                let result = provider.generate(prompt, image, params).await;
                let label = match &result {
                    Ok(_) => "ok",
                    Err(e) => errors.classify(e).kind.as_str(),
                };
                metrics::record_provider_attempt(label, call_started.elapsed());

                result
            })
            .await;

        result.map_err(|e| {
            tracing::debug!(
                stage = "classifying",
                attempts = attempts.load(Ordering::SeqCst),
                "Classifying provider failure"
            );
            self.classifier.classify(&e)
        })
    }
}
