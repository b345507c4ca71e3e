use chrono::NaiveDate;
use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

use crate::tools::bash::BASH_TOOL_NAME;
use crate::tools::computer::COMPUTER_TOOL_NAME;
use crate::tools::edit::EDIT_TOOL_NAME;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

#[derive(Serialize)]
struct SystemPromptContext<'a> {
    date: String,
    bash_tool: &'a str,
    computer_tool: &'a str,
    edit_tool: &'a str,
    stop_words: &'a [String],
    instructions: Option<&'a str>,
}

/// Render the system prompt for a run.
///
/// Pure: the same date, stop words and instructions always give the same prompt. `instructions`
/// is appended after the capability section and carries the task persona.
pub fn render_system_prompt(
    date: NaiveDate,
    stop_words: &[String],
    instructions: Option<&str>,
) -> Result<String, TeraError> {
    let context = SystemPromptContext {
        date: date.format("%A, %B %-d, %Y").to_string(),
        bash_tool: BASH_TOOL_NAME,
        computer_tool: COMPUTER_TOOL_NAME,
        edit_tool: EDIT_TOOL_NAME,
        stop_words,
        instructions: instructions.filter(|s| !s.trim().is_empty()),
    };
    load_prompt(SYSTEM_TEMPLATE, &context)
}
