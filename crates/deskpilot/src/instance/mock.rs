use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{BashRequest, ComputerAction, EditRequest, Instance, InstanceLauncher, InstanceSize};
use crate::tools::ToolOutput;

/// An in-memory instance that records every call it receives
#[derive(Default)]
pub struct MockInstance {
    pub calls: Mutex<Vec<String>>,
    pub bash_output: Mutex<ToolOutput>,
    pub screenshot: Option<String>,
    pub fail_stop: bool,
    pub stops: AtomicUsize,
}

impl MockInstance {
    pub fn new() -> Self {
        Self {
            screenshot: Some("c2NyZWVu".to_string()),
            ..Default::default()
        }
    }

    pub fn with_bash_output(self, output: ToolOutput) -> Self {
        *self.bash_output.lock().unwrap() = output;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Instance for MockInstance {
    fn id(&self) -> &str {
        "mock-instance"
    }

    async fn stream_url(&self) -> Result<String> {
        Ok("http://127.0.0.1:6080".to_string())
    }

    async fn bash(&self, request: &BashRequest) -> Result<ToolOutput> {
        self.record(format!("bash:{}", request.command.clone().unwrap_or_default()));
        Ok(self.bash_output.lock().unwrap().clone())
    }

    async fn computer(&self, action: &ComputerAction) -> Result<ToolOutput> {
        let name = serde_json::to_value(action)?["action"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        self.record(format!("computer:{}", name));
        match action {
            ComputerAction::Screenshot => Ok(ToolOutput {
                base64_image: self.screenshot.clone(),
                ..Default::default()
            }),
            ComputerAction::CursorPosition => Err(anyhow!("display unavailable")),
            _ => Ok(ToolOutput::default()),
        }
    }

    async fn edit(&self, request: &EditRequest) -> Result<ToolOutput> {
        self.record(format!("edit:{}", request.path()));
        Ok(ToolOutput::text(format!("edited {}", request.path())))
    }

    async fn browser_start(&self) -> Result<String> {
        self.record("browser_start".to_string());
        Ok("ws://127.0.0.1:9222".to_string())
    }

    async fn browser_authenticate(&self, auth_state_id: &str) -> Result<()> {
        self.record(format!("browser_authenticate:{}", auth_state_id));
        Ok(())
    }

    async fn browser_stop(&self) -> Result<()> {
        self.record("browser_stop".to_string());
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(anyhow!("stop failed"));
        }
        Ok(())
    }
}

/// Hands out the same mock instance on every start
pub struct MockLauncher {
    pub instance: Arc<MockInstance>,
    pub starts: AtomicUsize,
}

impl MockLauncher {
    pub fn new(instance: Arc<MockInstance>) -> Self {
        Self {
            instance,
            starts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InstanceLauncher for MockLauncher {
    async fn start(&self, _size: InstanceSize) -> Result<Arc<dyn Instance>> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(self.instance.clone())
    }
}
