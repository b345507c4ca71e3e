use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Local, NaiveDate};
use console::style;
use futures::StreamExt;

use deskpilot::agent::{
    Agent, AgentConfig, EmptyResultFallback, TerminationPolicy, DEFAULT_STOP_WORDS,
};
use deskpilot::instance::{BashRequest, Instance, InstanceLauncher};
use deskpilot::models::content::PNG_MIME_TYPE;
use deskpilot::models::conversation::Conversation;
use deskpilot::models::message::Message;
use deskpilot::prompt_template::render_system_prompt;
use deskpilot::providers::anthropic::AnthropicProvider;
use deskpilot::providers::configs::AnthropicProviderConfig;
use deskpilot::session::with_instance;
use deskpilot::tools::{instance_tools, ToolRegistry};

use crate::inputs::Credentials;
use crate::prompt::{CliclackPrompt, Input};
use crate::Cli;

/// A headless task, loaded before any instance is leased
pub struct Task {
    prompt: String,
    image: Option<String>,
    setup: Vec<String>,
}

impl Task {
    pub fn load(prompt: &str, image: Option<&Path>, setup: &[String]) -> Result<Self> {
        let image = image
            .map(|path| {
                std::fs::read(path)
                    .with_context(|| format!("failed to read image {}", path.display()))
                    .map(|bytes| STANDARD.encode(bytes))
            })
            .transpose()?;

        Ok(Self {
            prompt: prompt.to_string(),
            image,
            setup: setup.to_vec(),
        })
    }

    fn first_message(&self) -> Message {
        let message = Message::user().with_text(&self.prompt);
        match &self.image {
            Some(data) => message.with_image(data, PNG_MIME_TYPE),
            None => message,
        }
    }
}

fn agent_config(cli: &Cli, today: NaiveDate) -> Result<AgentConfig> {
    let stop_words: Vec<String> = DEFAULT_STOP_WORDS.iter().map(|w| w.to_string()).collect();
    let system_prompt = render_system_prompt(today, &stop_words, None)?;

    let mut config = AgentConfig::new(system_prompt);
    if cli.stop_when_idle {
        config = config.with_termination(TerminationPolicy::StopWhenIdle);
    }
    if cli.screenshot_on_empty_bash {
        config = config.with_empty_result_fallback(EmptyResultFallback::screenshot_after_bash());
    }
    if let Some(max_turns) = cli.max_turns {
        config = config.with_max_turns(max_turns);
    }
    Ok(config)
}

fn build_agent(cli: &Cli, credentials: &Credentials, instance: Arc<dyn Instance>) -> Result<Agent> {
    let mut provider_config = AnthropicProviderConfig::new(&credentials.anthropic_api_key);
    provider_config.model = cli.model.clone();
    if cli.max_tokens.is_some() {
        provider_config.max_tokens = cli.max_tokens;
    }
    let provider = AnthropicProvider::new(provider_config)?;
    let tools = ToolRegistry::new(instance_tools(instance))?;
    let config = agent_config(cli, Local::now().date_naive())?;

    Ok(Agent::new(Box::new(provider), tools, config))
}

/// Run `work` unless `interrupt` resolves first, in which case fail with "interrupted"
async fn until_interrupted<T, W, I>(work: W, interrupt: I) -> Result<T>
where
    W: Future<Output = Result<T>>,
    I: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        result = work => result,
        signal = interrupt => {
            signal?;
            bail!("interrupted")
        }
    }
}

/// Ctrl-C turns into an error, so the instance guard still gets to stop the instance
async fn interruptible<T, W>(work: W) -> Result<T>
where
    W: Future<Output = Result<T>>,
{
    until_interrupted(work, tokio::signal::ctrl_c()).await
}

async fn run_setup(instance: &dyn Instance, commands: &[String]) -> Result<()> {
    for command in commands {
        tracing::info!(command = %command, "running setup command");
        let output = instance.bash(&BashRequest::command(command)).await?;
        if output.is_error() {
            bail!(
                "setup command `{}` failed: {}",
                command,
                output.error.unwrap_or_default()
            );
        }
    }
    Ok(())
}

/// Starts the instance browser and loads the stored auth state into it
async fn start_browser(instance: &dyn Instance, auth_state_id: &str) -> Result<()> {
    let cdp_url = instance.browser_start().await?;
    tracing::debug!(cdp_url = %cdp_url, "browser started");
    instance.browser_authenticate(auth_state_id).await?;
    Ok(())
}

/// Shared setup and teardown around the body of a session
async fn on_instance<'a, F, Fut>(
    cli: &'a Cli,
    launcher: &dyn InstanceLauncher,
    prompt: &'a mut CliclackPrompt,
    body: F,
) -> Result<()>
where
    F: FnOnce(Arc<dyn Instance>, &'a mut CliclackPrompt) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    prompt.show_busy("Starting instance");
    let auth_state_id = cli.auth_state_id.as_deref();

    with_instance(launcher, cli.instance_type.into(), |instance| async move {
        let stream_url = interruptible(instance.stream_url()).await;
        prompt.hide_busy();
        println!("{} {}", style("Watch the instance at").dim(), stream_url?);

        if let Some(auth_state_id) = auth_state_id {
            interruptible(start_browser(instance.as_ref(), auth_state_id)).await?;
        }

        let result = body(Arc::clone(&instance), prompt).await;

        if auth_state_id.is_some() {
            if let Err(e) = instance.browser_stop().await {
                tracing::warn!(error = %e, "failed to stop browser");
            }
        }
        result
    })
    .await
}

enum Outcome {
    Finished,
    Failed(anyhow::Error),
    Interrupted,
}

/// Stream one task to the terminal until it finishes, fails or Ctrl-C is pressed
async fn run_task(agent: &Agent, prompt: &mut CliclackPrompt, conversation: Conversation) -> Outcome {
    let streamed = async {
        prompt.show_busy("Working");
        let mut stream = agent.reply(conversation);
        while let Some(message) = stream.next().await {
            prompt.render(&message?)?;
            prompt.show_busy("Working");
        }
        anyhow::Ok(())
    };

    let outcome = tokio::select! {
        result = streamed => match result {
            Ok(()) => Outcome::Finished,
            Err(e) => Outcome::Failed(e),
        },
        _ = tokio::signal::ctrl_c() => Outcome::Interrupted,
    };
    prompt.hide_busy();
    outcome
}

pub async fn interactive(
    cli: &Cli,
    credentials: &Credentials,
    launcher: &dyn InstanceLauncher,
) -> Result<()> {
    let mut prompt = CliclackPrompt::new();

    on_instance(cli, launcher, &mut prompt, |instance, prompt| async move {
        let agent = build_agent(cli, credentials, instance)?;

        println!(
            "deskpilot is ready {}",
            style("- type \"exit\" to end the session").dim()
        );
        println!();

        loop {
            let task = match prompt.get_input()? {
                Input::Exit => break,
                Input::Message(task) if task.is_empty() => continue,
                Input::Message(task) => task,
            };

            let conversation = Conversation::seeded(Message::user().with_text(task));
            match run_task(&agent, prompt, conversation).await {
                Outcome::Finished => {}
                Outcome::Failed(e) => prompt.render_error(&e),
                Outcome::Interrupted => {
                    println!("{}", style("Task interrupted").yellow());
                }
            }
        }
        Ok(())
    })
    .await
}

pub async fn headless(
    cli: &Cli,
    credentials: &Credentials,
    launcher: &dyn InstanceLauncher,
    task: Task,
) -> Result<()> {
    let mut prompt = CliclackPrompt::new();

    on_instance(cli, launcher, &mut prompt, |instance, prompt| async move {
        if !task.setup.is_empty() {
            prompt.show_busy("Running setup commands");
            let setup = interruptible(run_setup(instance.as_ref(), &task.setup)).await;
            prompt.hide_busy();
            setup?;
        }

        let agent = build_agent(cli, credentials, instance)?;
        let conversation = Conversation::seeded(task.first_message());
        match run_task(&agent, prompt, conversation).await {
            Outcome::Finished => Ok(()),
            Outcome::Failed(e) => Err(e),
            Outcome::Interrupted => bail!("task interrupted"),
        }
    })
    .await
}
