//! # Structured output
//!
//! A session can be asked to end by submitting a value of a declared shape.
//! The shape is described to the model as the parameters of a dedicated
//! `structured_output` tool; whatever the model passes to that tool is the
//! session's payload.

use crate::provider::ToolDefinition;
use serde::de::DeserializeOwned;

/// Name of the tool the model calls to submit its final answer
pub const STRUCTURED_OUTPUT_TOOL: &str = "structured_output";

/// A type the model can be asked to produce
pub trait OutputSchema: DeserializeOwned {
    /// Short description shown to the model alongside the schema
    fn description() -> &'static str;

    /// JSON schema of the expected arguments
    fn schema() -> serde_json::Value;

    fn tool_definition() -> ToolDefinition {
        ToolDefinition::new(
            STRUCTURED_OUTPUT_TOOL,
            format!(
                "Submit the final result of the task. Call this exactly once, when you are done. {}",
                Self::description()
            ),
        )
        .with_parameters(Self::schema())
    }
}

/// Outcome of asking for a structured value.
///
/// `Malformed` keeps what the model actually sent; `Missing` means the
/// session ended without a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Structured<T> {
    Parsed(T),
    Malformed(serde_json::Value),
    Missing,
}

impl<T: OutputSchema> Structured<T> {
    pub fn from_submission(raw: serde_json::Value) -> Self {
        match serde_json::from_value::<T>(raw.clone()) {
            Ok(value) => Structured::Parsed(value),
            Err(e) => {
                tracing::warn!(error = %e, "structured output did not match schema");
                Structured::Malformed(raw)
            }
        }
    }
}

impl<T> Structured<T> {
    pub fn parsed(self) -> Option<T> {
        match self {
            Structured::Parsed(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Structured::Parsed(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Structured<U> {
        match self {
            Structured::Parsed(value) => Structured::Parsed(f(value)),
            Structured::Malformed(raw) => Structured::Malformed(raw),
            Structured::Missing => Structured::Missing,
        }
    }
}

impl<T: Default> Structured<T> {
    /// The parsed value, or an empty one for the degenerate outcomes
    pub fn unwrap_or_empty(self) -> T {
        self.parsed().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq, Deserialize)]
    struct Names {
        names: Vec<String>,
    }

    impl OutputSchema for Names {
        fn description() -> &'static str {
            "A list of names."
        }

        fn schema() -> serde_json::Value {
            json!({
                "type": "object",
                "properties": { "names": { "type": "array", "items": { "type": "string" } } },
                "required": ["names"]
            })
        }
    }

    #[test]
    fn test_tool_definition() {
        let tool = Names::tool_definition();
        assert_eq!(tool.name, STRUCTURED_OUTPUT_TOOL);
        assert!(tool.description.ends_with("A list of names."));
        assert_eq!(tool.parameters["required"][0], "names");
    }

    #[test]
    fn test_submission_parsing() {
        let ok = Structured::<Names>::from_submission(json!({"names": ["a", "b"]}));
        assert_eq!(ok.parsed().unwrap().names.len(), 2);

        let raw = json!({"names": "not a list"});
        let bad = Structured::<Names>::from_submission(raw.clone());
        assert_eq!(bad, Structured::Malformed(raw));
    }

    #[test]
    fn test_degenerate_outcomes_are_empty() {
        assert_eq!(Structured::<Names>::Missing.unwrap_or_empty(), Names::default());
        let malformed = Structured::<Names>::Malformed(json!(null));
        assert!(!malformed.is_parsed());
        assert!(malformed.unwrap_or_empty().names.is_empty());
    }
}
