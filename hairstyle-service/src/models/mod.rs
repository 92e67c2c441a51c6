pub mod analysis;

pub use analysis::{AnalysisReport, AnalysisRequest, AnalysisResult, Suggestion};
