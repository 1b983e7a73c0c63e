//! Shell execution inside an Ubuntu instance

use super::ToolDefinition;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BashRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Restart the shell session instead of running a command
    #[serde(default)]
    pub restart: bool,
}

impl BashRequest {
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            restart: false,
        }
    }

    pub fn describe(&self) -> String {
        match (&self.command, self.restart) {
            (_, true) => "$ (restart shell)".to_string(),
            (Some(command), false) => format!("$ {}", command),
            (None, false) => "$".to_string(),
        }
    }
}

pub fn definition() -> ToolDefinition {
    ToolDefinition::new(
        "bash",
        "Run a bash command in the instance's shell. State persists between calls. \
         GUI apps must be started with DISPLAY=:1 in a subshell, e.g. (DISPLAY=:1 xterm &).",
    )
    .with_parameters(serde_json::json!({
        "type": "object",
        "properties": {
            "command": { "type": "string", "description": "The command to run" },
            "restart": { "type": "boolean", "description": "Restart the shell session" }
        },
        "required": []
    }))
}
