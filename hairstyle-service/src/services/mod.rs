pub mod analyzer;
pub mod classifier;
pub mod metrics;
pub mod normalizer;
pub mod providers;
pub mod scratch;

pub use analyzer::{AnalysisError, HairstyleAnalyzer};
pub use classifier::{ClassifiedError, ErrorClassifier, ErrorKind};
