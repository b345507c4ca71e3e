use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{parse_input, Tool, ToolOutput};
use crate::errors::{AgentError, AgentResult};
use crate::instance::{BashRequest, Instance};

pub const BASH_TOOL_NAME: &str = "bash";

/// Runs shell commands on the instance
pub struct BashTool {
    instance: Arc<dyn Instance>,
}

impl BashTool {
    pub fn new(instance: Arc<dyn Instance>) -> Self {
        Self { instance }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        BASH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Run commands in a bash shell on the instance. GUI applications must be started in a \
        subshell with the display set, e.g. `(DISPLAY=:1 xterm &)`. Set `restart` to get a fresh shell."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": [],
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to run."
                },
                "restart": {
                    "type": "boolean",
                    "description": "Restart the shell session."
                }
            }
        })
    }

    async fn call(&self, input: Value) -> AgentResult<ToolOutput> {
        let request: BashRequest = parse_input(input)?;
        if request.command.is_none() && !request.restart {
            return Err(AgentError::InvalidParameters(
                "Either `command` or `restart` must be provided".into(),
            ));
        }

        tracing::debug!(command = ?request.command, restart = request.restart, "bash");
        self.instance
            .bash(&request)
            .await
            .map_err(|e| AgentError::ExecutionError(e.to_string()))
    }
}
