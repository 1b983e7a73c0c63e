//! # vmpilot runtime
//!
//! The pieces an agent session is made of, without the loop itself.
//!
//! ## Core Concepts
//! - **Transcript**: ordered user/assistant messages with text, tool calls and tool results
//! - **Provider**: trait-based model access (Anthropic, OpenAI)
//! - **Instance**: a remote Ubuntu desktop or browser reached through `InstanceApi`
//! - **Tools**: the closed set of actions the model can take on an instance
//! - **Schema**: typed structured output submitted through a dedicated tool

pub mod instance;
pub mod prompt;
pub mod provider;
pub mod schema;
pub mod tools;
pub mod transcript;

pub use vmpilot_error::{Error, ErrorKind, Result};
pub use instance::{InstanceApi, InstanceHandle, InstanceKind, ScrapybaraClient};
pub use provider::{
    AnthropicProvider, CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
    ModelChoice, OpenAIProvider, ProviderConfig, ProviderError, ProviderType, ToolDefinition,
    Usage, UsageTracker,
};
pub use schema::{OutputSchema, Structured, STRUCTURED_OUTPUT_TOOL};
pub use tools::{describe_call, BashRequest, ComputerAction, EditCommand, ToolKind, ToolSet};
pub use transcript::{
    answer_pending_calls, Message, Part, Role, ToolCall, ToolOutput, ToolResultPart, Transcript,
    NO_RESULT,
};
