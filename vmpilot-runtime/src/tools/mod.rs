//! # Tools
//!
//! The closed set of capabilities the model can invoke on an instance.
//! Each `ToolKind` carries its own schema and argument type; a `ToolSet`
//! binds a validated selection of them to one live instance.

pub mod bash;
pub mod computer;
pub mod edit;

pub use bash::BashRequest;
pub use computer::{ClickType, ComputerAction, MouseButton, Point};
pub use edit::EditCommand;

use crate::instance::{InstanceApi, InstanceHandle, InstanceKind};
use crate::provider::ToolDefinition;
use crate::transcript::{ToolCall, ToolOutput};
use vmpilot_error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Computer,
    Bash,
    Edit,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::Computer, ToolKind::Bash, ToolKind::Edit];

    /// Name the model calls the tool by
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Computer => "computer",
            ToolKind::Bash => "bash",
            ToolKind::Edit => "str_replace_editor",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn definition(&self) -> ToolDefinition {
        match self {
            ToolKind::Computer => computer::definition(),
            ToolKind::Bash => bash::definition(),
            ToolKind::Edit => edit::definition(),
        }
    }

    /// Tools that make sense on a given kind of instance.
    ///
    /// A browser instance has no shell, only its display.
    pub fn for_instance(kind: InstanceKind) -> Vec<ToolKind> {
        match kind {
            InstanceKind::Ubuntu => vec![ToolKind::Computer, ToolKind::Bash, ToolKind::Edit],
            InstanceKind::Browser => vec![ToolKind::Computer],
        }
    }
}

/// One-line description of a tool call for step logs
pub fn describe_call(call: &ToolCall) -> String {
    let described = match ToolKind::from_name(&call.name) {
        Some(ToolKind::Computer) => call.parse_args::<ComputerAction>().ok().map(|a| a.describe()),
        Some(ToolKind::Bash) => call.parse_args::<BashRequest>().ok().map(|r| r.describe()),
        Some(ToolKind::Edit) => call.parse_args::<EditCommand>().ok().map(|c| c.describe()),
        None => None,
    };
    described.unwrap_or_else(|| format!("{} {}", call.name, call.args))
}

/// A validated set of tools bound to one instance
pub struct ToolSet<'a, I> {
    api: &'a I,
    instance: InstanceHandle,
    kinds: Vec<ToolKind>,
}

impl<'a, I: InstanceApi> ToolSet<'a, I> {
    /// Bind `kinds` to `instance`.
    ///
    /// The set must be non-empty and free of duplicates.
    pub fn new(api: &'a I, instance: InstanceHandle, kinds: Vec<ToolKind>) -> Result<Self> {
        if kinds.is_empty() {
            return Err(Error::config_invalid("tool set is empty").with_operation("tools::new"));
        }
        for (i, kind) in kinds.iter().enumerate() {
            if kinds[..i].contains(kind) {
                return Err(Error::new(
                    ErrorKind::ToolConflict,
                    format!("tool '{}' declared twice", kind.name()),
                )
                .with_operation("tools::new")
                .with_context("tool", kind.name()));
            }
        }
        Ok(Self { api, instance, kinds })
    }

    /// The default tools for the instance's kind
    pub fn for_instance(api: &'a I, instance: InstanceHandle) -> Self {
        let kinds = ToolKind::for_instance(instance.kind);
        Self { api, instance, kinds }
    }

    pub fn instance(&self) -> &InstanceHandle {
        &self.instance
    }

    pub fn kinds(&self) -> &[ToolKind] {
        &self.kinds
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.iter().any(|k| k.name() == name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.kinds.iter().map(ToolKind::definition).collect()
    }

    /// Execute one call.
    ///
    /// Returns `None` when the call names a tool outside this set.
    pub async fn invoke(&self, call: &ToolCall) -> Option<Result<ToolOutput>> {
        let kind = ToolKind::from_name(&call.name).filter(|k| self.kinds.contains(k))?;
        let result = match kind {
            ToolKind::Computer => match call.parse_args::<ComputerAction>() {
                Ok(action) => self.api.computer(&self.instance, &action).await,
                Err(e) => Err(bad_input(call, e)),
            },
            ToolKind::Bash => match call.parse_args::<BashRequest>() {
                Ok(request) => self.api.bash(&self.instance, &request).await,
                Err(e) => Err(bad_input(call, e)),
            },
            ToolKind::Edit => match call.parse_args::<EditCommand>() {
                Ok(command) => self.api.edit(&self.instance, &command).await,
                Err(e) => Err(bad_input(call, e)),
            },
        };
        Some(result.map_err(|e| e.with_context("tool", kind.name()).with_context("call_id", call.id.clone())))
    }

    /// Capture the current display, if this set can
    pub async fn screenshot(&self) -> Option<Result<ToolOutput>> {
        if !self.kinds.contains(&ToolKind::Computer) {
            return None;
        }
        Some(self.api.computer(&self.instance, &ComputerAction::TakeScreenshot).await)
    }
}

fn bad_input(call: &ToolCall, err: serde_json::Error) -> Error {
    Error::new(ErrorKind::InvalidToolInput, format!("invalid arguments: {}", err))
        .with_operation("tools::invoke")
        .set_source(err)
        .with_context("args", call.args.to_string())
}
