//! Request and result types for a single hairstyle analysis.

use serde::{Deserialize, Serialize};

/// An uploaded image awaiting analysis. Lives only for one request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image: Vec<u8>,
    pub mime_type: String,
}

impl AnalysisRequest {
    pub fn new(image: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            image,
            mime_type: mime_type.into(),
        }
    }
}

/// Structured hairstyle analysis. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub current_hairstyle: String,
    pub description: String,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub name: String,
    pub reason: String,
}

impl Suggestion {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Successful response body: the normalized analysis plus the untouched model text.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub success: bool,
    pub analysis: AnalysisResult,
    pub raw_response: String,
}

impl AnalysisReport {
    pub fn new(analysis: AnalysisResult, raw_response: String) -> Self {
        Self {
            success: true,
            analysis,
            raw_response,
        }
    }
}
