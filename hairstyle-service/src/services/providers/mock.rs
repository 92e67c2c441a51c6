//! Mock provider implementation for testing.

use super::{
    FinishReason, GenerationParams, InlineImage, ProviderError, ProviderResponse, VisionProvider,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Replays a fixed script of outcomes, one per call.
///
/// Once the script is exhausted the last outcome repeats, so "always fails"
/// needs only a single entry.
pub struct MockVisionProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    last: Mutex<Option<Result<String, ProviderError>>>,
    calls: AtomicU32,
    seen: Mutex<Vec<InlineImage>>,
}

impl MockVisionProvider {
    pub fn new(script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// A provider that always answers with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(text.into())])
    }

    /// A provider that always fails with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Images received, in call order.
    pub fn images(&self) -> Vec<InlineImage> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn next_outcome(&self) -> Result<String, ProviderError> {
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let mut last = match self.last.lock() {
            Ok(last) => last,
            Err(poisoned) => poisoned.into_inner(),
        };

        match next {
            Some(outcome) => {
                *last = Some(outcome.clone());
                outcome
            }
            None => last.clone().unwrap_or_else(|| {
                Err(ProviderError::NotConfigured(
                    "Mock provider has no scripted responses".to_string(),
                ))
            }),
        }
    }
}

#[async_trait]
impl VisionProvider for MockVisionProvider {
    async fn generate(
        &self,
        prompt: &str,
        image: &InlineImage,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(image.clone());
        }

        let text = self.next_outcome()?;

        Ok(ProviderResponse {
            input_tokens: prompt.len() as i32 / 4,
            output_tokens: text.len() as i32 / 4,
            text,
            finish_reason: FinishReason::Complete,
        })
    }

    fn model(&self) -> &str {
        "mock-vision"
    }
}
