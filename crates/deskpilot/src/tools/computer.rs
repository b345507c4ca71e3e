use async_trait::async_trait;
use indoc::indoc;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{parse_input, Tool, ToolOutput};
use crate::errors::{AgentError, AgentResult};
use crate::instance::{ComputerAction, Instance};

pub const COMPUTER_TOOL_NAME: &str = "computer";

/// Mouse, keyboard and screenshot control of the instance display
pub struct ComputerTool {
    instance: Arc<dyn Instance>,
}

impl ComputerTool {
    pub fn new(instance: Arc<dyn Instance>) -> Self {
        Self { instance }
    }
}

#[async_trait]
impl Tool for ComputerTool {
    fn name(&self) -> &str {
        COMPUTER_TOOL_NAME
    }

    fn description(&self) -> &str {
        indoc! {"
            Use a mouse and keyboard to interact with the instance display, and take screenshots.
            The screen is 1024x768. Always take a screenshot before clicking to find coordinates,
            and click in the center of elements rather than on their edges.
        "}
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["action"],
            "properties": {
                "action": {
                    "enum": [
                        "key", "type", "mouse_move", "left_click", "left_click_drag",
                        "right_click", "middle_click", "double_click", "screenshot",
                        "cursor_position"
                    ],
                    "description": "The action to perform."
                },
                "coordinate": {
                    "type": "array",
                    "items": {"type": "integer"},
                    "description": "(x, y) pixel position. Required for `mouse_move` and `left_click_drag`."
                },
                "text": {
                    "type": "string",
                    "description": "Required for `type` and `key`. Keys use xdotool syntax, e.g. `ctrl+a`."
                }
            }
        })
    }

    async fn call(&self, input: Value) -> AgentResult<ToolOutput> {
        let action: ComputerAction = parse_input(input)?;
        tracing::debug!(action = %action.describe(), "computer action");
        self.instance
            .computer(&action)
            .await
            .map_err(|e| AgentError::ExecutionError(e.to_string()))
    }
}
