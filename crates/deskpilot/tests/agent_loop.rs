use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;

use deskpilot::agent::{Agent, AgentConfig, EmptyResultFallback, LoopState};
use deskpilot::instance::{
    BashRequest, ComputerAction, EditRequest, Instance, InstanceLauncher, InstanceSize,
};
use deskpilot::models::conversation::Conversation;
use deskpilot::models::message::Message;
use deskpilot::models::role::Role;
use deskpilot::providers::base::{Provider, Usage};
use deskpilot::session::with_instance;
use deskpilot::tools::{instance_tools, ToolOutput, ToolRegistry, ToolSpec};

/// Replays canned replies and remembers which tools were advertised
struct ScriptedProvider {
    replies: Mutex<Vec<Message>>,
    advertised: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Message>) -> Self {
        Self {
            replies: Mutex::new(replies),
            advertised: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<(Message, Usage)> {
        *self.advertised.lock().unwrap() = tools.iter().map(|t| t.name.clone()).collect();
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err(anyhow!("script exhausted"));
        }
        Ok((replies.remove(0), Usage::new(Some(10), Some(5), Some(15))))
    }
}

#[derive(Default)]
struct FakeDesktop {
    log: Mutex<Vec<String>>,
    stops: AtomicUsize,
}

#[async_trait]
impl Instance for FakeDesktop {
    fn id(&self) -> &str {
        "desk-1"
    }

    async fn stream_url(&self) -> Result<String> {
        Ok("https://stream.example/desk-1".to_string())
    }

    async fn bash(&self, request: &BashRequest) -> Result<ToolOutput> {
        let command = request.command.clone().unwrap_or_default();
        self.log.lock().unwrap().push(format!("bash {}", command));
        if command.ends_with('&') || command.ends_with("&)") {
            return Ok(ToolOutput::default());
        }
        Ok(ToolOutput::text("Desktop\nDocuments"))
    }

    async fn computer(&self, action: &ComputerAction) -> Result<ToolOutput> {
        self.log.lock().unwrap().push(action.describe());
        match action {
            ComputerAction::Screenshot => Ok(ToolOutput::image("aW1hZ2U=")),
            _ => Ok(ToolOutput::default()),
        }
    }

    async fn edit(&self, request: &EditRequest) -> Result<ToolOutput> {
        Err(anyhow!("read-only filesystem: {}", request.path()))
    }

    async fn browser_start(&self) -> Result<String> {
        Ok("ws://localhost:9222".to_string())
    }

    async fn browser_authenticate(&self, _auth_state_id: &str) -> Result<()> {
        Ok(())
    }

    async fn browser_stop(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeLauncher(Arc<FakeDesktop>);

#[async_trait]
impl InstanceLauncher for FakeLauncher {
    async fn start(&self, _size: InstanceSize) -> Result<Arc<dyn Instance>> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_desktop_task_end_to_end() -> Result<()> {
    let desktop = Arc::new(FakeDesktop::default());
    let launcher = FakeLauncher(desktop.clone());
    let provider = ScriptedProvider::new(vec![
        Message::assistant()
            .with_text("Let me look around.")
            .with_tool_use("t1", "bash", json!({"command": "ls ~"}))
            .with_tool_use("t2", "str_replace_editor", json!({"command": "view", "path": "/etc/hosts"})),
        Message::assistant().with_tool_use("t3", "bash", json!({"command": "(DISPLAY=:1 xterm &)"})),
        Message::assistant().with_text("The terminal is open. Exit."),
    ]);

    let (conversation, summary) = with_instance(&launcher, InstanceSize::Medium, |instance| async move {
        let tools = ToolRegistry::new(instance_tools(instance))?;
        let config = AgentConfig::new("You operate a desktop.")
            .with_empty_result_fallback(EmptyResultFallback::screenshot_after_bash());
        let agent = Agent::new(Box::new(provider), tools, config);

        let mut conversation = Conversation::seeded(Message::user().with_text("open a terminal"));
        let summary = agent.run(&mut conversation).await?;
        Ok((conversation, summary))
    })
    .await?;

    assert_eq!(desktop.stops.load(Ordering::SeqCst), 1);
    assert_eq!(summary.turns, 3);
    assert_eq!(summary.input_tokens, 30);
    assert_eq!(summary.output_tokens, 15);

    // seed, reply, results, reply, results, final reply
    assert_eq!(conversation.len(), 6);
    let first_results = conversation.messages()[2].tool_results();
    assert_eq!(conversation.messages()[2].role, Role::User);
    assert_eq!(first_results.len(), 2);
    assert_eq!(first_results[0].text(), "Desktop\nDocuments");
    assert!(first_results[1].is_error);
    assert!(first_results[1].text().contains("read-only filesystem"));

    let fallback = conversation.messages()[4].tool_results();
    assert!(fallback[0].has_image());
    assert!(!fallback[0].is_error);

    assert_eq!(
        *desktop.log.lock().unwrap(),
        vec!["bash ls ~", "bash (DISPLAY=:1 xterm &)", "Taking screenshot"]
    );
    Ok(())
}

#[tokio::test]
async fn test_turn_by_turn_with_registry_tools() -> Result<()> {
    let desktop: Arc<dyn Instance> = Arc::new(FakeDesktop::default());
    let provider = ScriptedProvider::new(vec![
        Message::assistant().with_tool_use("t1", "computer", json!({"action": "screenshot"})),
        Message::assistant().with_text("I see the desktop"),
    ]);
    let tools = ToolRegistry::new(instance_tools(desktop))?;
    let agent = Agent::new(Box::new(provider), tools, AgentConfig::new("system"));
    let mut conversation = Conversation::seeded(Message::user().with_text("what is on screen?"));

    assert_eq!(agent.turn(&mut conversation).await?, LoopState::Running);
    assert!(conversation.messages()[2].tool_results()[0].has_image());

    assert_eq!(agent.turn(&mut conversation).await?, LoopState::Running);
    let nudge = conversation.last().expect("nudge");
    assert_eq!(nudge.role, Role::User);
    assert!(nudge.texts()[0].contains("exit"));
    Ok(())
}

#[tokio::test]
async fn test_script_failure_still_releases_instance() {
    let desktop = Arc::new(FakeDesktop::default());
    let launcher = FakeLauncher(desktop.clone());
    let provider = ScriptedProvider::new(vec![Message::assistant().with_tool_use(
        "t1",
        "computer",
        json!({"action": "key", "text": "Return"}),
    )]);

    let result = with_instance(&launcher, InstanceSize::Small, |instance| async move {
        let tools = ToolRegistry::new(instance_tools(instance))?;
        let agent = Agent::new(Box::new(provider), tools, AgentConfig::new("system"));
        agent
            .run(&mut Conversation::seeded(Message::user().with_text("press enter")))
            .await
    })
    .await;

    assert_eq!(result.unwrap_err().to_string(), "script exhausted");
    assert_eq!(desktop.stops.load(Ordering::SeqCst), 1);
    assert_eq!(*desktop.log.lock().unwrap(), vec!["Pressing key 'RETURN'"]);
}
