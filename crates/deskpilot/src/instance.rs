//! The remote instance boundary
//!
//! An instance is a virtual desktop leased from an automation service. The agent loop never
//! talks to the service directly: tools go through [`Instance`], and the lifecycle guard in
//! [`crate::session`] goes through [`InstanceLauncher`].
pub mod scrapybara;

#[cfg(test)]
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::tools::ToolOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceSize {
    #[default]
    Small,
    Medium,
    Large,
}

impl InstanceSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceSize::Small => "small",
            InstanceSize::Medium => "medium",
            InstanceSize::Large => "large",
        }
    }
}

impl fmt::Display for InstanceSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "small" => Ok(InstanceSize::Small),
            "medium" => Ok(InstanceSize::Medium),
            "large" => Ok(InstanceSize::Large),
            other => anyhow::bail!(
                "instance size must be one of: \"small\", \"medium\", \"large\" (got \"{}\")",
                other
            ),
        }
    }
}

/// A single input action against the instance display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ComputerAction {
    Key { text: String },
    Type { text: String },
    MouseMove { coordinate: [i64; 2] },
    LeftClick,
    LeftClickDrag { coordinate: [i64; 2] },
    RightClick,
    MiddleClick,
    DoubleClick,
    Screenshot,
    CursorPosition,
}

impl ComputerAction {
    /// Short label used when rendering what the agent is doing
    pub fn describe(&self) -> String {
        match self {
            ComputerAction::Key { text } => format!("Pressing key '{}'", text.to_uppercase()),
            ComputerAction::Type { .. } => "Typing".to_string(),
            ComputerAction::MouseMove { .. } => "Moving mouse".to_string(),
            ComputerAction::LeftClick
            | ComputerAction::RightClick
            | ComputerAction::MiddleClick
            | ComputerAction::DoubleClick => "Clicking".to_string(),
            ComputerAction::LeftClickDrag { .. } => "Dragging".to_string(),
            ComputerAction::Screenshot => "Taking screenshot".to_string(),
            ComputerAction::CursorPosition => "Reading cursor position".to_string(),
        }
    }
}

/// A file editing command executed on the instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditRequest {
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
        insert_line: i64,
        new_str: String,
    },
    UndoEdit {
        path: String,
    },
}

impl EditRequest {
    pub fn path(&self) -> &str {
        match self {
            EditRequest::View { path, .. }
            | EditRequest::Create { path, .. }
            | EditRequest::StrReplace { path, .. }
            | EditRequest::Insert { path, .. }
            | EditRequest::UndoEdit { path } => path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BashRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub restart: bool,
}

impl BashRequest {
    pub fn command<S: Into<String>>(command: S) -> Self {
        Self {
            command: Some(command.into()),
            restart: false,
        }
    }
}

/// A running remote desktop
#[async_trait]
pub trait Instance: Send + Sync {
    fn id(&self) -> &str;

    /// URL of the live VNC stream for a human to watch
    async fn stream_url(&self) -> Result<String>;

    async fn bash(&self, request: &BashRequest) -> Result<ToolOutput>;

    async fn computer(&self, action: &ComputerAction) -> Result<ToolOutput>;

    async fn edit(&self, request: &EditRequest) -> Result<ToolOutput>;

    /// Start the instance browser and return its CDP endpoint
    async fn browser_start(&self) -> Result<String>;

    /// Load a stored auth state into the running browser
    async fn browser_authenticate(&self, auth_state_id: &str) -> Result<()>;

    async fn browser_stop(&self) -> Result<()>;

    /// Release the instance. Callers go through [`crate::session::with_instance`] so this
    /// happens exactly once.
    async fn stop(&self) -> Result<()>;
}

/// Leases new instances from an automation service
#[async_trait]
pub trait InstanceLauncher: Send + Sync {
    async fn start(&self, size: InstanceSize) -> Result<Arc<dyn Instance>>;
}
