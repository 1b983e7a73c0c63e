//! # Transcript
//!
//! The ordered conversation driving one agent session.
//!
//! A transcript is a list of [`Message`]s, each tagged user or assistant and
//! carrying [`Part`]s: free text, a tool call emitted by the model, or the
//! result of executing one. Transcripts only ever grow while a session runs.

use serde::{Deserialize, Serialize};

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    /// Deserialize the arguments into a typed request
    pub fn parse_args<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.args.clone())
    }
}

/// What executing one tool call produced.
///
/// Any combination of the three fields may be present; a result with none
/// of them is "empty".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,
}

impl ToolOutput {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Default::default()
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn image(base64_image: impl Into<String>) -> Self {
        Self {
            base64_image: Some(base64_image.into()),
            ..Default::default()
        }
    }

    /// True when no field carries any content
    pub fn is_empty(&self) -> bool {
        fn blank(field: &Option<String>) -> bool {
            field.as_deref().map_or(true, str::is_empty)
        }
        blank(&self.output) && blank(&self.error) && blank(&self.base64_image)
    }
}

/// A tool result bound to the call that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPart {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(flatten)]
    pub result: ToolOutput,
}

impl ToolResultPart {
    pub fn is_error(&self) -> bool {
        self.result.error.as_deref().is_some_and(|e| !e.is_empty())
    }
}

/// One element of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    ToolCall(ToolCall),
    ToolResult(ToolResultPart),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }
}

/// A single turn in the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    pub fn assistant(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Assistant,
            parts,
        }
    }

    pub fn tool_results(results: Vec<ToolResultPart>) -> Self {
        Self {
            role: Role::User,
            parts: results.into_iter().map(Part::ToolResult).collect(),
        }
    }

    /// Concatenated text parts, or None when there are none
    pub fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } if !text.is_empty() => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.parts.iter().filter_map(|p| match p {
            Part::ToolCall(call) => Some(call),
            _ => None,
        })
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls().next().is_some()
    }
}

/// Ordered conversation history for one session
pub type Transcript = Vec<Message>;

/// Error text standing in for a tool call that produced no result
pub const NO_RESULT: &str = "tool produced no result";

/// Copy of `messages` in which every tool call has a result in the next turn.
///
/// Calls the transcript left unanswered get a `NO_RESULT` error result, placed
/// after the results already in the following user turn, or in a new user
/// turn when the next message is not one. The transcript itself is untouched.
pub fn answer_pending_calls(messages: &[Message]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len());
    let mut iter = messages.iter().peekable();

    while let Some(msg) = iter.next() {
        out.push(msg.clone());
        if msg.role != Role::Assistant || !msg.has_tool_calls() {
            continue;
        }

        let next = iter.peek().copied().filter(|m| m.role == Role::User);
        let answered: Vec<&str> = next
            .map(|m| {
                m.parts
                    .iter()
                    .filter_map(|p| match p {
                        Part::ToolResult(r) => Some(r.tool_call_id.as_str()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let placeholders: Vec<Part> = msg
            .tool_calls()
            .filter(|call| !answered.contains(&call.id.as_str()))
            .map(|call| {
                Part::ToolResult(ToolResultPart {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    result: ToolOutput::error(NO_RESULT),
                })
            })
            .collect();
        if placeholders.is_empty() {
            continue;
        }

        match next {
            Some(next) => {
                iter.next();
                let (results, rest): (Vec<Part>, Vec<Part>) = next
                    .parts
                    .iter()
                    .cloned()
                    .partition(|p| matches!(p, Part::ToolResult(_)));
                let parts = results.into_iter().chain(placeholders).chain(rest).collect();
                out.push(Message { role: Role::User, parts });
            }
            None => out.push(Message { role: Role::User, parts: placeholders }),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_output_emptiness() {
        assert!(ToolOutput::default().is_empty());
        assert!(ToolOutput::text("").is_empty());
        assert!(!ToolOutput::text("ok").is_empty());
        assert!(!ToolOutput::error("boom").is_empty());
        assert!(!ToolOutput::image("iVBORw0KGgo=").is_empty());
    }

    #[test]
    fn test_message_accessors() {
        let msg = Message::assistant(vec![
            Part::text("Let me look"),
            Part::ToolCall(ToolCall::new("c1", "computer", json!({"action": "take_screenshot"}))),
            Part::text("then click"),
        ]);

        assert_eq!(msg.text().as_deref(), Some("Let me look\nthen click"));
        assert_eq!(msg.tool_calls().count(), 1);
        assert!(msg.has_tool_calls());
        assert!(!Message::user("hi").has_tool_calls());
    }

    #[test]
    fn test_part_serialization_is_tagged() {
        let part = Part::ToolResult(ToolResultPart {
            tool_call_id: "c1".into(),
            tool_name: "bash".into(),
            result: ToolOutput::text("done"),
        });
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], "tool_result");
        assert_eq!(value["output"], "done");
        assert!(value.get("error").is_none());
    }

    fn result_ids(msg: &Message) -> Vec<&str> {
        msg.parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolResult(r) => Some(r.tool_call_id.as_str()),
                _ => None,
            })
            .collect()
    }

    fn calls(ids: &[&str]) -> Message {
        Message::assistant(
            ids.iter()
                .map(|id| Part::ToolCall(ToolCall::new(*id, "computer", json!({"action": "take_screenshot"}))))
                .collect(),
        )
    }

    fn result(id: &str) -> ToolResultPart {
        ToolResultPart {
            tool_call_id: id.into(),
            tool_name: "computer".into(),
            result: ToolOutput::image("iVBOR"),
        }
    }

    #[test]
    fn test_pending_calls_get_error_results() {
        let transcript = vec![
            Message::user("edit the file"),
            calls(&["c1", "c2"]),
            Message::tool_results(vec![result("c2")]),
        ];

        let answered = answer_pending_calls(&transcript);

        assert_eq!(answered.len(), 3);
        assert_eq!(result_ids(&answered[2]), vec!["c2", "c1"]);
        let Part::ToolResult(placeholder) = &answered[2].parts[1] else {
            panic!("expected a tool result");
        };
        assert!(placeholder.is_error());
        assert_eq!(placeholder.result.error.as_deref(), Some(NO_RESULT));
        // the transcript keeps only what actually ran
        assert_eq!(result_ids(&transcript[2]), vec!["c2"]);
    }

    #[test]
    fn test_unanswered_round_gets_its_own_turn() {
        let transcript = vec![Message::user("go"), calls(&["c1"]), calls(&["c2"]), Message::user("next")];

        let answered = answer_pending_calls(&transcript);

        let roles: Vec<_> = answered.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant, Role::User]);
        assert_eq!(result_ids(&answered[2]), vec!["c1"]);
        // results come before the user's text in the merged turn
        assert_eq!(result_ids(&answered[4]), vec!["c2"]);
        assert!(matches!(answered[4].parts[0], Part::ToolResult(_)));
        assert_eq!(answered[4].text().as_deref(), Some("next"));
    }

    #[test]
    fn test_answered_transcript_is_unchanged() {
        let transcript = vec![Message::user("go"), calls(&["c1"]), Message::tool_results(vec![result("c1")])];
        assert_eq!(answer_pending_calls(&transcript), transcript);
    }

    #[test]
    fn test_parse_args() {
        #[derive(serde::Deserialize)]
        struct Args {
            command: String,
        }
        let call = ToolCall::new("c1", "bash", json!({"command": "ls -la"}));
        let args: Args = call.parse_args().unwrap();
        assert_eq!(args.command, "ls -la");
    }
}
