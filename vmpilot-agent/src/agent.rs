//! Agent loop - drives the model <-> instance cycle for one session

use tracing::{debug, info, warn};
use vmpilot_error::Error;
use vmpilot_runtime::{
    describe_call, CompletionRequest, InstanceApi, LlmProvider, Message, OutputSchema, Structured,
    ToolCall, ToolDefinition, ToolKind, ToolOutput, ToolResultPart, ToolSet, Transcript, Usage,
    UsageTracker, STRUCTURED_OUTPUT_TOOL,
};

/// Configuration for the agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model id; the provider default when unset
    pub model: Option<String>,
    /// Upper bound on rounds per session
    pub max_rounds: usize,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_rounds: 100,
            max_tokens: 4096,
            temperature: None,
        }
    }
}

impl AgentConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}

/// What one round of the loop produced, as seen by an observer
#[derive(Debug, Clone)]
pub struct Step {
    pub round: usize,
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

/// Receives every step of a session. Must not fail; it has no say in control flow.
pub trait StepObserver {
    fn on_step(&self, step: &Step);
}

impl<F: Fn(&Step)> StepObserver for F {
    fn on_step(&self, step: &Step) {
        self(step)
    }
}

/// Prints steps to stdout, optionally tagged with the instance they ran on
#[derive(Debug, Clone, Default)]
pub struct ConsoleObserver {
    label: Option<String>,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labeled(label: impl Into<String>) -> Self {
        Self { label: Some(label.into()) }
    }

    pub fn render(&self, step: &Step) -> Vec<String> {
        let tag = self.label.as_deref().map(|l| format!(" [{}]", l)).unwrap_or_default();
        let mut lines = Vec::new();
        if let Some(text) = step.text.as_deref().filter(|t| !t.trim().is_empty()) {
            lines.push(format!("₍ᐢ•(ܫ)•ᐢ₎{}: {}", tag, text));
        }
        for call in &step.tool_calls {
            lines.push(format!("  {}{} → {}", call.name, tag, describe_call(call)));
        }
        lines
    }
}

impl StepObserver for ConsoleObserver {
    fn on_step(&self, step: &Step) {
        for line in self.render(step) {
            println!("{}", line);
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A round produced no tool calls
    Completed,
    /// The model call failed; the transcript is returned as it was
    ModelError,
    /// The model submitted its structured output
    StructuredOutput,
    /// `max_rounds` was reached
    RoundLimit,
}

/// Result of one session
#[derive(Debug)]
pub struct SessionOutcome {
    pub transcript: Transcript,
    pub stop: StopReason,
    pub rounds: usize,
    pub usage: UsageTracker,
    /// The model failure behind `StopReason::ModelError`
    pub error: Option<Error>,
    /// Raw arguments of the structured output call
    pub submission: Option<serde_json::Value>,
}

impl SessionOutcome {
    fn new(transcript: Transcript, stop: StopReason, rounds: usize, usage: UsageTracker) -> Self {
        Self {
            transcript,
            stop,
            rounds,
            usage,
            error: None,
            submission: None,
        }
    }

    /// Text of the last assistant message, if any
    pub fn final_text(&self) -> Option<String> {
        self.transcript
            .iter()
            .rev()
            .find(|m| m.role == vmpilot_runtime::Role::Assistant)
            .and_then(Message::text)
    }
}

/// Result of a structured session
#[derive(Debug)]
pub struct Extraction<T> {
    pub value: Structured<T>,
    pub session: SessionOutcome,
}

/// The agent - runs sessions against one model provider
pub struct Agent<P> {
    provider: P,
    config: AgentConfig,
}

impl<P: LlmProvider> Agent<P> {
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, AgentConfig::default())
    }

    pub fn with_config(provider: P, config: AgentConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run the loop until the model stops calling tools.
    ///
    /// Never fails: model errors end the session with `StopReason::ModelError`
    /// and tool failures produce no result for the failing call.
    pub async fn run<I: InstanceApi>(
        &self,
        tools: &ToolSet<'_, I>,
        system: &str,
        transcript: Transcript,
        observer: &dyn StepObserver,
    ) -> SessionOutcome {
        self.session(tools, system, transcript, None, observer).await
    }

    /// Run a session from a single instruction
    pub async fn act<I: InstanceApi>(
        &self,
        tools: &ToolSet<'_, I>,
        system: &str,
        prompt: &str,
        observer: &dyn StepObserver,
    ) -> SessionOutcome {
        self.run(tools, system, vec![Message::user(prompt)], observer).await
    }

    /// Run a session that ends with the model submitting a `T`
    pub async fn extract<T: OutputSchema, I: InstanceApi>(
        &self,
        tools: &ToolSet<'_, I>,
        system: &str,
        prompt: &str,
        observer: &dyn StepObserver,
    ) -> Extraction<T> {
        let session = self
            .session(tools, system, vec![Message::user(prompt)], Some(T::tool_definition()), observer)
            .await;

        let value = match &session.submission {
            Some(raw) => Structured::from_submission(raw.clone()),
            None => {
                warn!(
                    instance = %tools.instance().id,
                    stop = ?session.stop,
                    "session ended without structured output"
                );
                Structured::Missing
            }
        };
        Extraction { value, session }
    }

    async fn session<I: InstanceApi>(
        &self,
        tools: &ToolSet<'_, I>,
        system: &str,
        mut transcript: Transcript,
        output_tool: Option<ToolDefinition>,
        observer: &dyn StepObserver,
    ) -> SessionOutcome {
        let instance = &tools.instance().id;
        let structured = output_tool.is_some();
        let mut definitions = tools.definitions();
        definitions.extend(output_tool);

        let mut usage = UsageTracker::new();

        for round in 1..=self.config.max_rounds {
            let mut request = CompletionRequest::new(transcript.clone())
                .with_system(system)
                .with_tools(definitions.clone())
                .with_max_tokens(self.config.max_tokens);
            if let Some(model) = &self.config.model {
                request = request.with_model(model);
            }
            if let Some(temperature) = self.config.temperature {
                request = request.with_temperature(temperature);
            }

            debug!(%instance, round, messages = transcript.len(), "requesting completion");
            let response = match self.provider.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    let err = Error::from(e).with_context("instance", instance.clone());
                    warn!(%instance, round, error = %err, "model call failed, ending session");
                    let mut outcome = SessionOutcome::new(transcript, StopReason::ModelError, round, usage);
                    outcome.error = Some(err);
                    return outcome;
                }
            };

            usage.track(&response.model, &response.usage);
            let calls = response.tool_calls();
            observer.on_step(&Step {
                round,
                text: response.text(),
                tool_calls: calls.clone(),
                usage: response.usage.clone(),
            });

            let submission = structured
                .then(|| calls.iter().find(|c| c.name == STRUCTURED_OUTPUT_TOOL))
                .flatten()
                .map(|c| c.args.clone());

            transcript.push(Message::assistant(response.parts));

            if let Some(raw) = submission {
                info!(%instance, round, "structured output submitted");
                let mut outcome = SessionOutcome::new(transcript, StopReason::StructuredOutput, round, usage);
                outcome.submission = Some(raw);
                return outcome;
            }
            if calls.is_empty() {
                info!(%instance, round, tokens = usage.total_tokens(), "session completed");
                return SessionOutcome::new(transcript, StopReason::Completed, round, usage);
            }

            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                if let Some(result) = self.dispatch(tools, call).await {
                    results.push(ToolResultPart {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        result,
                    });
                }
            }
            if !results.is_empty() {
                transcript.push(Message::tool_results(results));
            }
        }

        warn!(%instance, max_rounds = self.config.max_rounds, "round limit reached");
        SessionOutcome::new(transcript, StopReason::RoundLimit, self.config.max_rounds, usage)
    }

    /// Execute one call; `None` means the call produced nothing to report back
    async fn dispatch<I: InstanceApi>(&self, tools: &ToolSet<'_, I>, call: &ToolCall) -> Option<ToolOutput> {
        let instance = &tools.instance().id;
        let result = match tools.invoke(call).await {
            Some(Ok(output)) => Some(output),
            Some(Err(e)) => {
                warn!(%instance, tool = %call.name, call_id = %call.id, error = %e, "tool invocation failed");
                None
            }
            None => {
                warn!(%instance, tool = %call.name, call_id = %call.id, "unknown tool, skipping call");
                None
            }
        };

        let empty = result.as_ref().map_or(true, ToolOutput::is_empty);
        if call.name == ToolKind::Bash.name() && empty {
            match tools.screenshot().await {
                Some(Ok(screenshot)) => {
                    debug!(%instance, call_id = %call.id, "empty bash result, attached screenshot");
                    return Some(screenshot);
                }
                Some(Err(e)) => {
                    warn!(%instance, call_id = %call.id, error = %e, "fallback screenshot failed");
                }
                None => {}
            }
        }
        result
    }
}
