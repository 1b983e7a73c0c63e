//! OpenAI-compatible provider implementation
//!
//! Works with OpenAI and other chat-completions compatible APIs. Tool messages
//! only carry text there, so screenshots returned by a tool are attached as a
//! follow-up user message holding data-URL images.

use super::*;
use crate::transcript::{answer_pending_calls, Role, ToolResultPart};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible provider
pub struct OpenAIProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAIProvider {
    pub fn new(config: ProviderConfig) -> vmpilot_error::Result<Self> {
        let client = config.http_client()?;
        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or("https://api.openai.com/v1")
    }
}

impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn models(&self) -> Vec<String> {
        vec![
            "gpt-4o".into(),
            "gpt-4o-mini".into(),
            "gpt-4.1".into(),
            "o3".into(),
        ]
    }

    fn default_model(&self) -> &str {
        self.config.default_model.as_deref().unwrap_or("gpt-4o")
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let model = request.model.as_deref().unwrap_or(self.default_model());

        let api_request = OpenAIRequest {
            model: model.to_string(),
            messages: to_openai_messages(request.system.as_deref(), &request.messages),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(
                    request
                        .tools
                        .iter()
                        .map(|t| OpenAITool {
                            r#type: "function".into(),
                            function: OpenAIFunction {
                                name: t.name.clone(),
                                description: Some(t.description.clone()),
                                parameters: Some(t.parameters.clone()),
                            },
                        })
                        .collect(),
                )
            },
        };

        let mut req = self.client
            .post(format!("{}/chat/completions", self.base_url()))
            .json(&api_request);

        if let Some(api_key) = &self.config.api_key {
            if !api_key.is_empty() {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }
        }

        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }

        tracing::debug!(model, messages = api_request.messages.len(), "openai request");

        let response = req.send().await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();

            if status == 429 {
                return Err(ProviderError::RateLimited { retry_after: None });
            } else if status == 401 {
                return Err(ProviderError::AuthenticationFailed);
            }

            return Err(ProviderError::Api { status, message: text });
        }

        let api_response: OpenAIResponse = response.json().await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        api_response.into_completion()
    }
}

/// Flatten a transcript into chat-completions messages.
///
/// Calls without a result are answered with an error `tool` message, since
/// every `tool_calls` entry needs one right after the assistant message.
fn to_openai_messages(system: Option<&str>, messages: &[Message]) -> Vec<OpenAIMessage> {
    let mut out = Vec::new();
    let messages = answer_pending_calls(messages);

    if let Some(system) = system {
        out.push(OpenAIMessage::text("system", system));
    }

    for msg in &messages {
        match msg.role {
            Role::Assistant => {
                let tool_calls: Vec<OpenAIToolCall> = msg
                    .tool_calls()
                    .map(|tc| OpenAIToolCall {
                        id: tc.id.clone(),
                        r#type: "function".into(),
                        function: OpenAIFunctionCall {
                            name: tc.name.clone(),
                            arguments: tc.args.to_string(),
                        },
                    })
                    .collect();
                out.push(OpenAIMessage {
                    role: "assistant".into(),
                    content: msg.text().map(OpenAIContent::Text),
                    tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                    tool_call_id: None,
                });
            }
            Role::User => {
                let mut images = Vec::new();
                for part in &msg.parts {
                    match part {
                        Part::Text { text } => out.push(OpenAIMessage::text("user", text)),
                        Part::ToolResult(result) => {
                            out.push(tool_message(result));
                            if let Some(image) =
                                result.result.base64_image.as_deref().filter(|i| !i.is_empty())
                            {
                                images.push(image.to_string());
                            }
                        }
                        // the model never sees its own calls in a user turn
                        Part::ToolCall(_) => {}
                    }
                }
                if !images.is_empty() {
                    let mut content = vec![ContentItem::Text {
                        text: "Screenshot(s) from the tool call(s) above.".into(),
                    }];
                    content.extend(images.into_iter().map(|data| ContentItem::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/png;base64,{}", data),
                        },
                    }));
                    out.push(OpenAIMessage {
                        role: "user".into(),
                        content: Some(OpenAIContent::Items(content)),
                        tool_calls: None,
                        tool_call_id: None,
                    });
                }
            }
        }
    }

    out
}

fn tool_message(part: &ToolResultPart) -> OpenAIMessage {
    let text = match (&part.result.error, &part.result.output) {
        (Some(error), _) if !error.is_empty() => format!("Error: {}", error),
        (_, Some(output)) if !output.is_empty() => output.clone(),
        _ if part.result.base64_image.is_some() => "Screenshot attached below.".to_string(),
        _ => "(no output)".to_string(),
    };
    OpenAIMessage {
        role: "tool".into(),
        content: Some(OpenAIContent::Text(text)),
        tool_calls: None,
        tool_call_id: Some(part.tool_call_id.clone()),
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<OpenAIContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenAIMessage {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(OpenAIContent::Text(text.to_string())),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Items(Vec<ContentItem>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentItem {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAITool {
    r#type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunction {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    r#type: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    id: String,
    model: String,
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

impl OpenAIResponse {
    fn into_completion(self) -> Result<CompletionResponse, ProviderError> {
        let choice = self.choices.into_iter().next()
            .ok_or_else(|| ProviderError::Other("No choices in response".into()))?;

        let mut parts = Vec::new();
        match choice.message.content {
            Some(OpenAIContent::Text(text)) if !text.is_empty() => parts.push(Part::Text { text }),
            Some(OpenAIContent::Items(items)) => {
                for item in items {
                    if let ContentItem::Text { text } = item {
                        parts.push(Part::Text { text });
                    }
                }
            }
            _ => {}
        }
        for tc in choice.message.tool_calls.unwrap_or_default() {
            // Unparseable arguments are passed through as a string so the
            // tool rejects them instead of the whole round failing.
            let args = serde_json::from_str(&tc.function.arguments)
                .unwrap_or(serde_json::Value::String(tc.function.arguments));
            parts.push(Part::ToolCall(ToolCall {
                id: tc.id,
                name: tc.function.name,
                args,
            }));
        }

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Unknown,
        };

        let usage = self.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }).unwrap_or_default();

        Ok(CompletionResponse {
            id: self.id,
            model: self.model,
            parts,
            finish_reason,
            usage,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::ToolOutput;
    use serde_json::json;

    #[test]
    fn test_screenshot_becomes_image_message() {
        let transcript = vec![
            Message::user("find the pricing page"),
            Message::assistant(vec![Part::ToolCall(ToolCall::new(
                "call_1",
                "computer",
                json!({"action": "take_screenshot"}),
            ))]),
            Message::tool_results(vec![ToolResultPart {
                tool_call_id: "call_1".into(),
                tool_name: "computer".into(),
                result: ToolOutput::image("iVBOR"),
            }]),
        ];

        let messages = to_openai_messages(Some("sys"), &transcript);
        let value = serde_json::to_value(&messages).unwrap();

        assert_eq!(value[0]["role"], "system");
        assert_eq!(value[2]["role"], "assistant");
        assert_eq!(value[2]["tool_calls"][0]["function"]["name"], "computer");
        assert_eq!(value[3]["role"], "tool");
        assert_eq!(value[3]["tool_call_id"], "call_1");
        assert_eq!(value[4]["role"], "user");
        assert_eq!(value[4]["content"][1]["type"], "image_url");
        assert_eq!(value[4]["content"][1]["image_url"]["url"], "data:image/png;base64,iVBOR");
    }

    #[test]
    fn test_every_tool_call_gets_a_tool_message() {
        let transcript = vec![
            Message::user("fix the config"),
            Message::assistant(vec![
                Part::ToolCall(ToolCall::new(
                    "call_1",
                    "str_replace_editor",
                    json!({"command": "str_replace", "path": "/etc/app.conf", "old_str": "a", "new_str": "b"}),
                )),
                Part::ToolCall(ToolCall::new("call_2", "computer", json!({"action": "take_screenshot"}))),
            ]),
            Message::tool_results(vec![ToolResultPart {
                tool_call_id: "call_2".into(),
                tool_name: "computer".into(),
                result: ToolOutput::image("iVBOR"),
            }]),
        ];

        let value = serde_json::to_value(to_openai_messages(None, &transcript)).unwrap();

        assert_eq!(value[1]["role"], "assistant");
        assert_eq!(value[2]["role"], "tool");
        assert_eq!(value[2]["tool_call_id"], "call_2");
        assert_eq!(value[3]["role"], "tool");
        assert_eq!(value[3]["tool_call_id"], "call_1");
        assert_eq!(value[3]["content"], "Error: tool produced no result");
        assert_eq!(value[4]["role"], "user");
        assert_eq!(value[4]["content"][1]["type"], "image_url");
    }

    #[test]
    fn test_tool_error_text() {
        let msg = tool_message(&ToolResultPart {
            tool_call_id: "c".into(),
            tool_name: "bash".into(),
            result: ToolOutput::error("no such file"),
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["content"], "Error: no such file");
    }

    #[test]
    fn test_response_with_bad_arguments() {
        let raw = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "call_a", "type": "function", "function": {"name": "bash", "arguments": "{\"command\": \"pwd\"}"}},
                        {"id": "call_b", "type": "function", "function": {"name": "bash", "arguments": "{not json"}}
                    ]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
        });
        let response: OpenAIResponse = serde_json::from_value(raw).unwrap();
        let completion = response.into_completion().unwrap();

        let calls = completion.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args["command"], "pwd");
        assert_eq!(calls[1].args, json!("{not json"));
        assert_eq!(completion.finish_reason, FinishReason::ToolCalls);
        assert!(completion.text().is_none());
    }
}
