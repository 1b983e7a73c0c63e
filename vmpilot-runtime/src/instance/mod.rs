//! # Remote instances
//!
//! An instance is a disposable Ubuntu desktop or headless browser hosted by
//! a remote service. `InstanceApi` is the seam between the agent and that
//! service: everything the agent does to an instance goes through it, so
//! tests can swap in an in-memory fake.

pub mod scrapybara;

pub use scrapybara::ScrapybaraClient;

use crate::tools::{BashRequest, ComputerAction, EditCommand};
use crate::transcript::ToolOutput;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vmpilot_error::{Error, Result};

/// Which kind of instance to start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceKind {
    Ubuntu,
    Browser,
}

impl InstanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceKind::Ubuntu => "ubuntu",
            InstanceKind::Browser => "browser",
        }
    }
}

impl fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ubuntu" => Ok(InstanceKind::Ubuntu),
            "browser" => Ok(InstanceKind::Browser),
            other => Err(Error::invalid_argument(format!(
                "unknown instance type '{}', expected 'ubuntu' or 'browser'",
                other
            ))
            .with_context("instance_type", other)),
        }
    }
}

/// A started instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHandle {
    pub id: String,
    pub kind: InstanceKind,
}

impl InstanceHandle {
    pub fn new(id: impl Into<String>, kind: InstanceKind) -> Self {
        Self { id: id.into(), kind }
    }
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.kind)
    }
}

/// Operations on the instance service
#[allow(async_fn_in_trait)]
pub trait InstanceApi {
    /// Start a fresh instance
    async fn start(&self, kind: InstanceKind) -> Result<InstanceHandle>;

    /// URL of the live view of the instance's display
    async fn stream_url(&self, instance: &InstanceHandle) -> Result<String>;

    async fn computer(&self, instance: &InstanceHandle, action: &ComputerAction) -> Result<ToolOutput>;

    async fn bash(&self, instance: &InstanceHandle, request: &BashRequest) -> Result<ToolOutput>;

    async fn edit(&self, instance: &InstanceHandle, command: &EditCommand) -> Result<ToolOutput>;

    /// Stop the instance. Stopping is final; the handle must not be used afterwards.
    async fn stop(&self, instance: &InstanceHandle) -> Result<()>;

    /// Run one shell command outside of any agent session
    async fn execute_shell(&self, instance: &InstanceHandle, command: &str) -> Result<ToolOutput> {
        tracing::debug!(instance = %instance.id, command, "shell");
        self.bash(instance, &BashRequest::command(command)).await
    }
}

impl<T: InstanceApi> InstanceApi for &T {
    async fn start(&self, kind: InstanceKind) -> Result<InstanceHandle> {
        (**self).start(kind).await
    }

    async fn stream_url(&self, instance: &InstanceHandle) -> Result<String> {
        (**self).stream_url(instance).await
    }

    async fn computer(&self, instance: &InstanceHandle, action: &ComputerAction) -> Result<ToolOutput> {
        (**self).computer(instance, action).await
    }

    async fn bash(&self, instance: &InstanceHandle, request: &BashRequest) -> Result<ToolOutput> {
        (**self).bash(instance, request).await
    }

    async fn edit(&self, instance: &InstanceHandle, command: &EditCommand) -> Result<ToolOutput> {
        (**self).edit(instance, command).await
    }

    async fn stop(&self, instance: &InstanceHandle) -> Result<()> {
        (**self).stop(instance).await
    }
}
