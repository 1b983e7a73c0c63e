//! File viewing and editing inside an Ubuntu instance

use super::ToolDefinition;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditCommand {
    View {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        view_range: Option<[i64; 2]>,
    },
    Create {
        path: String,
        file_text: String,
    },
    StrReplace {
        path: String,
        old_str: String,
        #[serde(default)]
        new_str: String,
    },
    Insert {
        path: String,
        insert_line: u64,
        new_str: String,
    },
    UndoEdit {
        path: String,
    },
}

impl EditCommand {
    pub fn path(&self) -> &str {
        match self {
            EditCommand::View { path, .. }
            | EditCommand::Create { path, .. }
            | EditCommand::StrReplace { path, .. }
            | EditCommand::Insert { path, .. }
            | EditCommand::UndoEdit { path } => path,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EditCommand::View { .. } => "view",
            EditCommand::Create { .. } => "create",
            EditCommand::StrReplace { .. } => "str_replace",
            EditCommand::Insert { .. } => "insert",
            EditCommand::UndoEdit { .. } => "undo_edit",
        }
    }

    pub fn describe(&self) -> String {
        format!("{} {}", self.name(), self.path())
    }
}

pub fn definition() -> ToolDefinition {
    ToolDefinition::new(
        "str_replace_editor",
        "View, create and edit files on the instance. `view` shows a file with line \
         numbers or lists a directory; `str_replace` requires `old_str` to match exactly once.",
    )
    .with_parameters(serde_json::json!({
        "type": "object",
        "properties": {
            "command": {
                "type": "string",
                "enum": ["view", "create", "str_replace", "insert", "undo_edit"]
            },
            "path": { "type": "string", "description": "Absolute path to the file or directory" },
            "file_text": { "type": "string" },
            "old_str": { "type": "string" },
            "new_str": { "type": "string" },
            "insert_line": { "type": "integer" },
            "view_range": {
                "type": "array",
                "items": { "type": "integer" },
                "minItems": 2,
                "maxItems": 2
            }
        },
        "required": ["command", "path"]
    }))
}
