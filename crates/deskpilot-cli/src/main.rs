mod inputs;
mod prompt;
mod session;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use deskpilot::instance::scrapybara::{ScrapybaraClient, ScrapybaraConfig};
use deskpilot::instance::InstanceSize;
use deskpilot::providers::configs::ANTHROPIC_MODEL;

use crate::inputs::Credentials;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Size of the remote instance to lease
    #[arg(long, value_enum, default_value = "small")]
    instance_type: CliInstanceSize,

    /// Model to drive the instance with
    #[arg(long, default_value = ANTHROPIC_MODEL)]
    model: String,

    /// Maximum tokens per model reply
    #[arg(long)]
    max_tokens: Option<i32>,

    /// Stored browser auth state to load into the instance browser
    #[arg(long, env = "AUTH_STATE_ID")]
    auth_state_id: Option<String>,

    /// Finish a task as soon as the model replies without tool calls
    #[arg(long)]
    stop_when_idle: bool,

    /// Take a screenshot whenever a shell command prints nothing
    #[arg(long)]
    screenshot_on_empty_bash: bool,

    /// Give up on a task after this many model turns
    #[arg(long)]
    max_turns: Option<usize>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum CliInstanceSize {
    Small,
    Medium,
    Large,
}

impl From<CliInstanceSize> for InstanceSize {
    fn from(size: CliInstanceSize) -> Self {
        match size {
            CliInstanceSize::Small => InstanceSize::Small,
            CliInstanceSize::Medium => InstanceSize::Medium,
            CliInstanceSize::Large => InstanceSize::Large,
        }
    }
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Start an interactive session, one task per prompt
    Session,

    /// Run a single task without interaction
    Run {
        /// The task for the agent
        #[arg(short, long)]
        prompt: String,

        /// PNG to attach to the first message
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,

        /// Shell command to run on the instance before the task starts
        #[arg(long = "setup", value_name = "CMD")]
        setup: Vec<String>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let credentials = Credentials::load()?;
    let launcher = ScrapybaraClient::new(ScrapybaraConfig::new(&credentials.scrapybara_api_key))?;

    match &cli.command {
        None | Some(Command::Session) => session::interactive(&cli, &credentials, &launcher).await,
        Some(Command::Run {
            prompt,
            image,
            setup,
        }) => {
            let task = session::Task::load(prompt, image.as_deref(), setup)?;
            session::headless(&cli, &credentials, &launcher, task).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{}", style(format!("Error: {:#}", e)).red());
        std::process::exit(1);
    }
    Ok(())
}
