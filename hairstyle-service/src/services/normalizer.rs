//! Turns free-form model text into a fully populated [`AnalysisResult`].
//!
//! Normalization never fails. It runs as three total stages:
//! [`extract_candidate`] finds a JSON-looking span, [`try_parse`] parses it,
//! and the result is completed with placeholders for anything missing.

use crate::models::{AnalysisResult, Suggestion};
use serde_json::{Map, Value};

const UNDETERMINED_HAIRSTYLE: &str = "Could not determine";
const COMPLETED_HAIRSTYLE: &str = "Analysis completed";
const EMPTY_DESCRIPTION: &str = "The model returned no analysis text.";
const MISSING_REASON: &str = "No reason provided";

/// Which path produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationPath {
    /// A JSON object was found and parsed.
    Parsed,
    /// No `{...}` span in the text.
    NoCandidate,
    /// A `{...}` span was found but is not a JSON object.
    Unparseable,
}

impl NormalizationPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizationPath::Parsed => "parsed",
            NormalizationPath::NoCandidate => "no_candidate",
            NormalizationPath::Unparseable => "unparseable",
        }
    }
}

/// Normalize raw model output. See [`normalize_with_path`].
pub fn normalize(raw_text: &str) -> AnalysisResult {
    normalize_with_path(raw_text).0
}

/// Normalize raw model output and report which path was taken.
pub fn normalize_with_path(raw_text: &str) -> (AnalysisResult, NormalizationPath) {
    let Some(candidate) = extract_candidate(raw_text) else {
        return (no_candidate_fallback(raw_text), NormalizationPath::NoCandidate);
    };

    match try_parse(candidate) {
        Some(object) => (from_object(&object, raw_text), NormalizationPath::Parsed),
        None => (unparseable_fallback(raw_text), NormalizationPath::Unparseable),
    }
}

/// Span from the first `{` through the last `}`, if both exist in that order.
pub fn extract_candidate(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Strict JSON parse; only objects are accepted.
pub fn try_parse(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate).ok()? {
        Value::Object(object) => Some(object),
        _ => None,
    }
}

fn from_object(object: &Map<String, Value>, raw_text: &str) -> AnalysisResult {
    let current_hairstyle =
        non_empty_str(object.get("currentHairstyle")).unwrap_or(UNDETERMINED_HAIRSTYLE);

    let description = non_empty_str(object.get("description"))
        .map(str::to_string)
        .unwrap_or_else(|| description_from(raw_text));

    let suggestions: Vec<Suggestion> = object
        .get("suggestions")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(suggestion_from).collect())
        .unwrap_or_default();

    AnalysisResult {
        current_hairstyle: current_hairstyle.to_string(),
        description,
        suggestions: if suggestions.is_empty() {
            vec![consult_response_suggestion()]
        } else {
            suggestions
        },
    }
}

fn suggestion_from(item: &Value) -> Option<Suggestion> {
    let name = non_empty_str(item.get("name"))?;
    let reason = non_empty_str(item.get("reason")).unwrap_or(MISSING_REASON);
    Some(Suggestion::new(name, reason))
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn description_from(raw_text: &str) -> String {
    if raw_text.trim().is_empty() {
        EMPTY_DESCRIPTION.to_string()
    } else {
        raw_text.to_string()
    }
}

fn consult_response_suggestion() -> Suggestion {
    Suggestion::new("Consult with response", "See full analysis above")
}

fn no_candidate_fallback(raw_text: &str) -> AnalysisResult {
    AnalysisResult {
        current_hairstyle: UNDETERMINED_HAIRSTYLE.to_string(),
        description: description_from(raw_text),
        suggestions: vec![consult_response_suggestion()],
    }
}

fn unparseable_fallback(raw_text: &str) -> AnalysisResult {
    AnalysisResult {
        current_hairstyle: COMPLETED_HAIRSTYLE.to_string(),
        description: description_from(raw_text),
        suggestions: vec![Suggestion::new(
            "See full analysis",
            "Complete analysis provided above",
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_fully_populated(result: &AnalysisResult) {
        assert!(!result.current_hairstyle.is_empty());
        assert!(!result.description.is_empty());
        assert!(!result.suggestions.is_empty());
        for s in &result.suggestions {
            assert!(!s.name.is_empty());
            assert!(!s.reason.is_empty());
        }
    }

    #[test]
    fn test_well_formed_json_round_trips() {
        let raw = r#"{"currentHairstyle":"Bob","description":"Short bob","suggestions":[{"name":"Pixie","reason":"Low maintenance"}]}"#;
        let (result, path) = normalize_with_path(raw);

        assert_eq!(path, NormalizationPath::Parsed);
        assert_eq!(
            result,
            AnalysisResult {
                current_hairstyle: "Bob".to_string(),
                description: "Short bob".to_string(),
                suggestions: vec![Suggestion::new("Pixie", "Low maintenance")],
            }
        );
    }

    #[test]
    fn test_json_inside_markdown_fence_is_found() {
        let raw = "Here you go:\n```json\n{\"currentHairstyle\":\"Undercut\",\"description\":\"Shaved sides\",\"suggestions\":[{\"name\":\"Quiff\",\"reason\":\"Adds height\"},{\"name\":\"Crew cut\",\"reason\":\"Easy\"}]}\n```\nEnjoy!";
        let result = normalize(raw);

        assert_eq!(result.current_hairstyle, "Undercut");
        assert_eq!(result.suggestions.len(), 2);
        assert_eq!(result.suggestions[1].name, "Crew cut");
    }

    #[test]
    fn test_no_braces_uses_raw_text() {
        let raw = "I cannot determine a hairstyle.";
        let (result, path) = normalize_with_path(raw);

        assert_eq!(path, NormalizationPath::NoCandidate);
        assert_eq!(result.current_hairstyle, "Could not determine");
        assert_eq!(result.description, raw);
        assert_eq!(
            result.suggestions,
            vec![Suggestion::new("Consult with response", "See full analysis above")]
        );
    }

    #[test]
    fn test_unparseable_candidate_degrades() {
        let raw = "Result: {currentHairstyle: Bob, oops}";
        let (result, path) = normalize_with_path(raw);

        assert_eq!(path, NormalizationPath::Unparseable);
        assert_eq!(result.current_hairstyle, "Analysis completed");
        assert_eq!(result.description, raw);
        assert_eq!(
            result.suggestions,
            vec![Suggestion::new(
                "See full analysis",
                "Complete analysis provided above"
            )]
        );
    }

    #[test]
    fn test_multiple_objects_are_unparseable() {
        let (_, path) = normalize_with_path(r#"{"a":1} and {"b":2}"#);
        assert_eq!(path, NormalizationPath::Unparseable);
    }

    #[test]
    fn test_missing_fields_are_defaulted_independently() {
        let raw = r#"{"currentHairstyle":"Afro"}"#;
        let result = normalize(raw);

        assert_eq!(result.current_hairstyle, "Afro");
        assert_eq!(result.description, raw);
        assert_eq!(
            result.suggestions,
            vec![Suggestion::new("Consult with response", "See full analysis above")]
        );
    }

    #[test]
    fn test_wrong_types_and_bad_suggestions_are_defaulted() {
        let raw = r#"{"currentHairstyle":42,"description":"","suggestions":[{"reason":"no name"},{"name":"Lob"},"junk"]}"#;
        let result = normalize(raw);

        assert_eq!(result.current_hairstyle, "Could not determine");
        assert_eq!(result.description, raw);
        assert_eq!(
            result.suggestions,
            vec![Suggestion::new("Lob", "No reason provided")]
        );
    }

    #[test]
    fn test_closing_brace_before_opening_is_no_candidate() {
        let (_, path) = normalize_with_path("} nothing here {");
        assert_eq!(path, NormalizationPath::NoCandidate);
    }

    #[test]
    fn test_extract_candidate_spans_first_to_last_brace() {
        assert_eq!(extract_candidate("a {x} b {y} c"), Some("{x} b {y}"));
        assert_eq!(extract_candidate("no json"), None);
        assert_eq!(extract_candidate("{"), None);
    }

    #[test]
    fn test_always_fully_populated() {
        let inputs = [
            "",
            "   ",
            "{}",
            "{",
            "}",
            "[]",
            r#"{"suggestions":[]}"#,
            r#"{"currentHairstyle":"  ","suggestions":null}"#,
            "plain prose with no structure",
            "{\"description\": \"unterminated",
        ];

        for input in inputs {
            let result = normalize(input);
            assert_fully_populated(&result);
        }
    }

    #[test]
    fn test_blank_text_gets_placeholder_description() {
        let result = normalize("");
        assert_eq!(result.description, "The model returned no analysis text.");
    }
}
