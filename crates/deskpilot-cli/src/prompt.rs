use std::io::{self, Write};

use anyhow::{anyhow, Result};
use bat::WrappingMode;
use cliclack::{input, spinner, ProgressBar};
use console::style;

use deskpilot::instance::ComputerAction;
use deskpilot::models::content::Content;
use deskpilot::models::message::{Message, MessageContent, ToolResult, ToolUse};
use deskpilot::tools::computer::COMPUTER_TOOL_NAME;

const THEME: &str = "zenburn";

pub enum Input {
    Message(String),
    Exit,
}

/// Terminal front end: reads tasks and renders the conversation as it grows
pub struct CliclackPrompt {
    spinner: Option<ProgressBar>,
}

fn print_with_header(content: &str, header: &str, language: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()).name(header))
        .theme(THEME)
        .language(language)
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow!("failed to render output: {}", e))?;
    Ok(())
}

fn print_markdown(content: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(THEME)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow!("failed to render output: {}", e))?;
    Ok(())
}

fn print_tool_use(tool_use: &ToolUse) -> Result<()> {
    if tool_use.name == COMPUTER_TOOL_NAME {
        if let Ok(action) = serde_json::from_value::<ComputerAction>(tool_use.input.clone()) {
            println!("{}", style(action.describe()).cyan());
        }
    }
    print_with_header(
        &serde_json::to_string_pretty(&tool_use.input)?,
        &format!("Tool Request: {}", tool_use.name),
        "JSON",
    )
}

fn print_tool_result(result: &ToolResult) -> Result<()> {
    let text = result.text();
    if result.is_error {
        println!("{}", style(format!("Tool error: {}", text)).red());
    } else if !text.is_empty() {
        let language = if text.trim_start().starts_with('{') {
            "JSON"
        } else {
            "Markdown"
        };
        print_with_header(&text, "Tool Result:", language)?;
    }

    for content in &result.content {
        if let Content::Image(image) = content {
            println!(
                "{}",
                style(format!("[screenshot: {}, {} bytes]", image.mime_type, image.data.len())).dim()
            );
        }
    }
    Ok(())
}

impl CliclackPrompt {
    pub fn new() -> Self {
        CliclackPrompt { spinner: None }
    }

    pub fn render(&mut self, message: &Message) -> Result<()> {
        self.hide_busy();

        for content in &message.content {
            match content {
                MessageContent::Text(text) => print_markdown(&text.text)?,
                MessageContent::Image(image) => {
                    println!("{}", style(format!("[image: {}]", image.mime_type)).dim())
                }
                MessageContent::ToolUse(tool_use) => print_tool_use(tool_use)?,
                MessageContent::ToolResult(result) => print_tool_result(result)?,
            }
        }

        println!();
        io::stdout().flush()?;
        Ok(())
    }

    pub fn render_error(&mut self, error: &anyhow::Error) {
        self.hide_busy();
        eprintln!("{}", style(format!("Error: {:#}", error)).red());
    }

    pub fn show_busy(&mut self, message: &str) {
        self.hide_busy();
        let spin = spinner();
        spin.start(message);
        self.spinner = Some(spin);
    }

    pub fn hide_busy(&mut self) {
        if let Some(spin) = self.spinner.take() {
            spin.stop("");
        }
    }

    pub fn get_input(&mut self) -> Result<Input> {
        let message_text: String = match input("Task:").placeholder("").multiline().interact() {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Input::Exit),
            Err(e) => return Err(e.into()),
        };
        Ok(parse_input(&message_text))
    }
}

impl Drop for CliclackPrompt {
    fn drop(&mut self) {
        self.hide_busy();
    }
}

/// "exit" or "quit" on their own end the session
fn parse_input(text: &str) -> Input {
    let text = text.trim();
    if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
        Input::Exit
    } else {
        Input::Message(text.to_string())
    }
}
