//! Anthropic Claude provider implementation

use super::*;
use crate::transcript::{answer_pending_calls, Role, ToolResultPart};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> vmpilot_error::Result<Self> {
        let client = config.http_client()?;
        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or("https://api.anthropic.com/v1")
    }
}

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn models(&self) -> Vec<String> {
        vec![
            "claude-3-7-sonnet-20250219".into(),
            "claude-3-5-sonnet-20241022".into(),
            "claude-sonnet-4-20250514".into(),
        ]
    }

    fn default_model(&self) -> &str {
        self.config.default_model.as_deref().unwrap_or("claude-3-7-sonnet-20250219")
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let model = request.model.as_deref().unwrap_or(self.default_model());

        let api_request = AnthropicRequest {
            model: model.to_string(),
            messages: to_anthropic_messages(&request.messages),
            system: request.system.clone(),
            max_tokens: request.max_tokens.unwrap_or(4096),
            temperature: request.temperature,
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(
                    request
                        .tools
                        .iter()
                        .map(|t| AnthropicTool {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            input_schema: t.parameters.clone(),
                        })
                        .collect(),
                )
            },
        };

        let api_key = self.config.api_key.as_ref()
            .ok_or(ProviderError::AuthenticationFailed)?;

        let mut req = self.client
            .post(format!("{}/messages", self.base_url()))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&api_request);

        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }

        tracing::debug!(model, messages = api_request.messages.len(), "anthropic request");

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

        let api_response: AnthropicResponse = response.json().await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(api_response.into_completion())
    }
}

// ============================================================================
// Anthropic API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<RequestBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Vec<ResultContent>,
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResultContent {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

fn tool_result_block(part: &ToolResultPart) -> RequestBlock {
    let mut content = Vec::new();
    if let Some(error) = part.result.error.as_deref().filter(|e| !e.is_empty()) {
        content.push(ResultContent::Text { text: error.to_string() });
    } else {
        if let Some(output) = part.result.output.as_deref().filter(|o| !o.is_empty()) {
            content.push(ResultContent::Text { text: output.to_string() });
        }
        if let Some(image) = part.result.base64_image.as_deref().filter(|i| !i.is_empty()) {
            content.push(ResultContent::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type: "image/png",
                    data: image.to_string(),
                },
            });
        }
    }
    RequestBlock::ToolResult {
        tool_use_id: part.tool_call_id.clone(),
        content,
        is_error: part.is_error(),
    }
}

/// Every `tool_use` must be answered by a `tool_result` in the next user turn.
fn to_anthropic_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
    answer_pending_calls(messages).iter().map(AnthropicMessage::from).collect()
}

impl From<&Message> for AnthropicMessage {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        let content = msg
            .parts
            .iter()
            .map(|part| match part {
                Part::Text { text } => RequestBlock::Text { text: text.clone() },
                Part::ToolCall(call) => RequestBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.args.clone(),
                },
                Part::ToolResult(result) => tool_result_block(result),
            })
            .collect();

        Self { role, content }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

impl AnthropicResponse {
    fn into_completion(self) -> CompletionResponse {
        let parts = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(Part::Text { text }),
                ContentBlock::ToolUse { id, name, input } => {
                    Some(Part::ToolCall(ToolCall { id, name, args: input }))
                }
                ContentBlock::Other => None,
            })
            .collect();

        let finish_reason = match self.stop_reason.as_deref() {
            Some("end_turn") => FinishReason::Stop,
            Some("max_tokens") => FinishReason::Length,
            Some("tool_use") => FinishReason::ToolCalls,
            _ => FinishReason::Unknown,
        };

        CompletionResponse {
            id: self.id,
            model: self.model,
            parts,
            finish_reason,
            usage: Usage {
                prompt_tokens: self.usage.input_tokens,
                completion_tokens: self.usage.output_tokens,
                total_tokens: self.usage.input_tokens + self.usage.output_tokens,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    // thinking and other block types are not fed back
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: usize,
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::ToolOutput;
    use serde_json::json;

    #[test]
    fn test_tool_result_with_image() {
        let msg = Message::tool_results(vec![ToolResultPart {
            tool_call_id: "toolu_1".into(),
            tool_name: "computer".into(),
            result: ToolOutput {
                output: Some("clicked".into()),
                error: None,
                base64_image: Some("iVBOR".into()),
            },
        }]);

        let value = serde_json::to_value(AnthropicMessage::from(&msg)).unwrap();
        assert_eq!(value["role"], "user");
        let block = &value["content"][0];
        assert_eq!(block["type"], "tool_result");
        assert_eq!(block["tool_use_id"], "toolu_1");
        assert_eq!(block["is_error"], false);
        assert_eq!(block["content"][0]["text"], "clicked");
        assert_eq!(block["content"][1]["type"], "image");
        assert_eq!(block["content"][1]["source"]["media_type"], "image/png");
    }

    #[test]
    fn test_error_result_drops_output() {
        let msg = Message::tool_results(vec![ToolResultPart {
            tool_call_id: "toolu_2".into(),
            tool_name: "bash".into(),
            result: ToolOutput {
                output: Some("partial".into()),
                error: Some("command not found".into()),
                base64_image: None,
            },
        }]);

        let value = serde_json::to_value(AnthropicMessage::from(&msg)).unwrap();
        let block = &value["content"][0];
        assert_eq!(block["is_error"], true);
        assert_eq!(block["content"].as_array().unwrap().len(), 1);
        assert_eq!(block["content"][0]["text"], "command not found");
    }

    #[test]
    fn test_assistant_tool_use_roundtrip() {
        let msg = Message::assistant(vec![
            Part::text("Checking"),
            Part::ToolCall(ToolCall::new("toolu_3", "bash", json!({"command": "ls"}))),
        ]);
        let value = serde_json::to_value(AnthropicMessage::from(&msg)).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["content"][1]["type"], "tool_use");
        assert_eq!(value["content"][1]["input"]["command"], "ls");
    }

    #[test]
    fn test_failed_call_is_answered() {
        let transcript = vec![
            Message::user("fix the config"),
            Message::assistant(vec![
                Part::ToolCall(ToolCall::new(
                    "toolu_1",
                    "str_replace_editor",
                    json!({"command": "str_replace", "path": "/etc/app.conf", "old_str": "a", "new_str": "b"}),
                )),
                Part::ToolCall(ToolCall::new("toolu_2", "computer", json!({"action": "take_screenshot"}))),
            ]),
            Message::tool_results(vec![ToolResultPart {
                tool_call_id: "toolu_2".into(),
                tool_name: "computer".into(),
                result: ToolOutput::image("iVBOR"),
            }]),
        ];

        let value = serde_json::to_value(to_anthropic_messages(&transcript)).unwrap();
        let results = value[2]["content"].as_array().unwrap();
        let answered: Vec<_> = results.iter().map(|b| b["tool_use_id"].as_str().unwrap()).collect();
        assert_eq!(answered, vec!["toolu_2", "toolu_1"]);
        assert_eq!(results[0]["is_error"], false);
        assert_eq!(results[1]["is_error"], true);
        assert_eq!(results[1]["content"][0]["text"], "tool produced no result");
    }

    #[test]
    fn test_round_without_results_gets_user_turn() {
        let transcript = vec![
            Message::user("go"),
            Message::assistant(vec![Part::ToolCall(ToolCall::new("toolu_1", "teleport", json!({})))]),
        ];

        let value = serde_json::to_value(to_anthropic_messages(&transcript)).unwrap();
        let messages = value.as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"][0]["type"], "tool_result");
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(messages[2]["content"][0]["is_error"], true);
    }

    #[test]
    fn test_response_parsing() {
        let raw = json!({
            "id": "msg_1",
            "model": "claude-3-7-sonnet-20250219",
            "content": [
                {"type": "thinking", "thinking": "hmm", "signature": "x"},
                {"type": "text", "text": "Taking a screenshot"},
                {"type": "tool_use", "id": "toolu_9", "name": "computer", "input": {"action": "take_screenshot"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 8}
        });
        let response: AnthropicResponse = serde_json::from_value(raw).unwrap();
        let completion = response.into_completion();

        assert_eq!(completion.finish_reason, FinishReason::ToolCalls);
        assert_eq!(completion.parts.len(), 2);
        assert_eq!(completion.tool_calls()[0].name, "computer");
        assert_eq!(completion.usage.total_tokens, 20);
    }
}
