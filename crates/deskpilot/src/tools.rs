pub mod bash;
pub mod computer;
pub mod edit;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::errors::{AgentError, AgentResult};
use crate::instance::Instance;
use crate::models::content::Content;
use crate::models::message::ToolResult;

pub use bash::BashTool;
pub use computer::ComputerTool;
pub use edit::EditTool;

/// The description of a tool that is advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON schema of the arguments the tool accepts
    pub input_schema: Value,
}

impl ToolSpec {
    pub fn new<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        ToolSpec {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// What a tool produced: optional text, optional error text and an optional base64 png
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub output: Option<String>,
    pub error: Option<String>,
    pub base64_image: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl ToolOutput {
    pub fn text<S: Into<String>>(output: S) -> Self {
        Self {
            output: Some(output.into()),
            ..Default::default()
        }
    }

    pub fn failure<S: Into<String>>(error: S) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn image<S: Into<String>>(base64_image: S) -> Self {
        Self {
            base64_image: Some(base64_image.into()),
            ..Default::default()
        }
    }

    /// True when there is no text, no error and no image
    pub fn is_empty(&self) -> bool {
        non_empty(&self.output).is_none()
            && non_empty(&self.error).is_none()
            && non_empty(&self.base64_image).is_none()
    }

    pub fn is_error(&self) -> bool {
        non_empty(&self.error).is_some()
    }

    /// Package the output as the answer to the tool use with `tool_use_id`.
    ///
    /// Output text comes first, then the error text, then the image. The result is flagged as
    /// an error iff there is error text.
    pub fn into_tool_result<S: Into<String>>(self, tool_use_id: S) -> ToolResult {
        let is_error = self.is_error();
        let mut content = Vec::new();
        if let Some(output) = non_empty(&self.output) {
            content.push(Content::text(output));
        }
        if let Some(error) = non_empty(&self.error) {
            content.push(Content::text(error));
        }
        if let Some(image) = non_empty(&self.base64_image) {
            content.push(Content::png(image));
        }
        ToolResult {
            tool_use_id: tool_use_id.into(),
            content,
            is_error,
        }
    }
}

impl From<AgentError> for ToolOutput {
    fn from(error: AgentError) -> Self {
        ToolOutput::failure(error.to_string())
    }
}

/// A capability the model can invoke by name
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn input_schema(&self) -> Value;

    /// Run the tool with the arguments the model supplied
    async fn call(&self, input: Value) -> AgentResult<ToolOutput>;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description(), self.input_schema())
    }
}

/// The set of tools available during a run, looked up by name
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build a registry, rejecting two tools with the same name
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> AgentResult<Self> {
        let mut by_name = HashMap::with_capacity(tools.len());
        for (index, tool) in tools.iter().enumerate() {
            if by_name.insert(tool.name().to_string(), index).is_some() {
                return Err(AgentError::DuplicateTool(tool.name().to_string()));
            }
        }
        Ok(Self { tools, by_name })
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.by_name.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    /// Schemas in registration order
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|tool| tool.spec()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// The computer, bash and editor tools bound to one instance
pub fn instance_tools(instance: Arc<dyn Instance>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ComputerTool::new(Arc::clone(&instance))),
        Arc::new(BashTool::new(Arc::clone(&instance))),
        Arc::new(EditTool::new(instance)),
    ]
}

/// Parse model supplied arguments into a typed request
pub(crate) fn parse_input<T: serde::de::DeserializeOwned>(input: Value) -> AgentResult<T> {
    serde_json::from_value(input).map_err(|e| AgentError::InvalidParameters(e.to_string()))
}
