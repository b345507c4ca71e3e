use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{parse_input, Tool, ToolOutput};
use crate::errors::{AgentError, AgentResult};
use crate::instance::{EditRequest, Instance};

pub const EDIT_TOOL_NAME: &str = "str_replace_editor";

/// Views, creates and edits files on the instance
pub struct EditTool {
    instance: Arc<dyn Instance>,
}

impl EditTool {
    pub fn new(instance: Arc<dyn Instance>) -> Self {
        Self { instance }
    }
}

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        EDIT_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Perform text editing operations on files of the instance. The `command` parameter specifies the operation to perform."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["command", "path"],
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path to file or directory."
                },
                "command": {
                    "enum": ["view", "create", "str_replace", "insert", "undo_edit"],
                    "description": "The command to run."
                },
                "new_str": {
                    "type": "string",
                    "description": "Required for `str_replace` and `insert` commands."
                },
                "old_str": {
                    "type": "string",
                    "description": "Required for `str_replace` command."
                },
                "file_text": {
                    "type": "string",
                    "description": "Required for `create` command."
                },
                "view_range": {
                    "type": "array",
                    "items": {"type": "integer"},
                    "description": "Optional for `view` command when viewing a file."
                },
                "insert_line": {
                    "type": "integer",
                    "description": "Required for `insert` command."
                }
            }
        })
    }

    async fn call(&self, input: Value) -> AgentResult<ToolOutput> {
        let request: EditRequest = parse_input(input)?;
        tracing::debug!(path = request.path(), "edit");
        self.instance
            .edit(&request)
            .await
            .map_err(|e| AgentError::ExecutionError(e.to_string()))
    }
}
