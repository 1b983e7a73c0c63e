//! In-memory provider and instance service for tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use vmpilot_error::{Error, Result};
use vmpilot_runtime::{
    BashRequest, CompletionRequest, CompletionResponse, ComputerAction, EditCommand, FinishReason,
    InstanceApi, InstanceHandle, InstanceKind, LlmProvider, Part, ProviderError, ToolCall,
    ToolOutput, Usage,
};

pub fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, args)
}

pub fn tool_reply(text: &str, calls: Vec<ToolCall>) -> CompletionResponse {
    let mut parts = Vec::new();
    if !text.is_empty() {
        parts.push(Part::text(text));
    }
    let finish_reason = if calls.is_empty() { FinishReason::Stop } else { FinishReason::ToolCalls };
    parts.extend(calls.into_iter().map(Part::ToolCall));
    CompletionResponse {
        id: "resp".into(),
        model: "fake-model".into(),
        parts,
        finish_reason,
        usage: Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        },
    }
}

pub fn text_reply(text: &str) -> CompletionResponse {
    tool_reply(text, vec![])
}

type Responder = Box<dyn Fn(&CompletionRequest) -> CompletionResponse>;

/// Replays a script, then falls back to a responder or a plain "done"
pub struct FakeProvider {
    script: Mutex<VecDeque<std::result::Result<CompletionResponse, ProviderError>>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeProvider {
    pub fn scripted(script: Vec<std::result::Result<CompletionResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn responding(f: impl Fn(&CompletionRequest) -> CompletionResponse + 'static) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(f)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl LlmProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn models(&self) -> Vec<String> {
        vec!["fake-model".into()]
    }

    fn default_model(&self) -> &str {
        "fake-model"
    }

    async fn complete(&self, request: CompletionRequest) -> std::result::Result<CompletionResponse, ProviderError> {
        // let sibling sessions interleave
        tokio::task::yield_now().await;
        self.requests.lock().unwrap().push(request.clone());
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.responder {
            Some(f) => Ok(f(&request)),
            None => Ok(text_reply("done")),
        }
    }
}

/// Instance service that records everything done to it.
///
/// Bash returns an empty result; edits on paths containing `fail` error out.
#[derive(Default)]
pub struct FakeInstances {
    next_id: AtomicUsize,
    live: AtomicUsize,
    peak_live: AtomicUsize,
    pub fail_start: AtomicBool,
    pub fail_stop: AtomicBool,
    started: Mutex<Vec<InstanceHandle>>,
    stopped: Mutex<Vec<String>>,
    actions: Mutex<Vec<String>>,
}

impl FakeInstances {
    pub fn started(&self) -> Vec<InstanceHandle> {
        self.started.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    pub fn peak_live(&self) -> usize {
        self.peak_live.load(Ordering::SeqCst)
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }
}

impl InstanceApi for FakeInstances {
    async fn start(&self, kind: InstanceKind) -> Result<InstanceHandle> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Error::instance_failed("no capacity"));
        }
        let id = format!("i-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_live.fetch_max(live, Ordering::SeqCst);
        let handle = InstanceHandle::new(id, kind);
        self.started.lock().unwrap().push(handle.clone());
        Ok(handle)
    }

    async fn stream_url(&self, instance: &InstanceHandle) -> Result<String> {
        Ok(format!("https://stream.local/{}", instance.id))
    }

    async fn computer(&self, _instance: &InstanceHandle, action: &ComputerAction) -> Result<ToolOutput> {
        self.record(action.describe());
        match action {
            ComputerAction::TakeScreenshot => Ok(ToolOutput::image("iVBORw0KGgo")),
            _ => Ok(ToolOutput::text("ok")),
        }
    }

    async fn bash(&self, _instance: &InstanceHandle, request: &BashRequest) -> Result<ToolOutput> {
        self.record(request.describe());
        Ok(ToolOutput::default())
    }

    async fn edit(&self, _instance: &InstanceHandle, command: &EditCommand) -> Result<ToolOutput> {
        self.record(command.describe());
        if command.path().contains("fail") {
            return Err(Error::instance_failed("no such file"));
        }
        Ok(ToolOutput::text("edited"))
    }

    async fn stop(&self, instance: &InstanceHandle) -> Result<()> {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.stopped.lock().unwrap().push(instance.id.clone());
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(Error::instance_failed("stop timed out"));
        }
        Ok(())
    }
}
