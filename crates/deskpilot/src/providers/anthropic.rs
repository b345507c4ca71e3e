use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{Provider, Usage};
use super::configs::{AnthropicProviderConfig, DEFAULT_MAX_TOKENS};
use crate::models::content::{Content, ImageContent};
use crate::models::message::{Message, MessageContent};
use crate::tools::ToolSpec;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

fn image_to_anthropic_spec(image: &ImageContent) -> Value {
    json!({
        "type": "image",
        "source": {
            "type": "base64",
            "media_type": image.mime_type,
            "data": image.data,
        }
    })
}

fn content_to_anthropic_spec(content: &Content) -> Value {
    match content {
        Content::Text(text) => json!({"type": "text", "text": text.text}),
        Content::Image(image) => image_to_anthropic_spec(image),
    }
}

/// Convert internal messages to Anthropic's content block format
pub fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| {
            let content: Vec<Value> = message
                .content
                .iter()
                .map(|content| match content {
                    MessageContent::Text(text) => json!({"type": "text", "text": text.text}),
                    MessageContent::Image(image) => image_to_anthropic_spec(image),
                    MessageContent::ToolUse(tool_use) => json!({
                        "type": "tool_use",
                        "id": tool_use.id,
                        "name": tool_use.name,
                        "input": tool_use.input,
                    }),
                    MessageContent::ToolResult(result) => json!({
                        "type": "tool_result",
                        "tool_use_id": result.tool_use_id,
                        "content": result.content.iter().map(content_to_anthropic_spec).collect::<Vec<_>>(),
                        "is_error": result.is_error,
                    }),
                })
                .collect();

            json!({
                "role": message.role.as_str(),
                "content": content,
            })
        })
        .collect()
}

pub fn tools_to_anthropic_spec(tools: &[ToolSpec]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.input_schema,
            })
        })
        .collect()
}

/// Convert an Anthropic response body into an assistant message
pub fn anthropic_response_to_message(response: &Value) -> Result<Message> {
    let blocks = response
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow!("Invalid response format from Anthropic API"))?;

    let mut message = Message::assistant();
    for block in blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                let text = block.get("text").and_then(|t| t.as_str()).unwrap_or_default();
                message = message.with_text(text);
            }
            Some("tool_use") => {
                let id = block
                    .get("id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| anyhow!("tool_use block without id"))?;
                let name = block
                    .get("name")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| anyhow!("tool_use block without name"))?;
                let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                message = message.with_tool_use(id, name, input);
            }
            other => {
                tracing::debug!(block_type = ?other, "skipping unsupported content block");
            }
        }
    }
    Ok(message)
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let usage = data.get("usage");
        let input_tokens = usage
            .and_then(|u| u.get("input_tokens"))
            .and_then(|v| v.as_i64())
            .and_then(|v| i32::try_from(v).ok());
        let output_tokens = usage
            .and_then(|u| u.get("output_tokens"))
            .and_then(|v| v.as_i64())
            .and_then(|v| i32::try_from(v).ok());
        let total_tokens = match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        };
        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let mut request = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        if !self.config.betas.is_empty() {
            request = request.header("anthropic-beta", self.config.betas.join(","));
        }

        let response = request.json(&payload).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(anyhow!("Request failed: {} - {}", status, error_text))
            }
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<(Message, Usage)> {
        let mut payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": messages_to_anthropic_spec(messages),
        });

        if !system.is_empty() {
            payload["system"] = json!(system);
        }
        if !tools.is_empty() {
            payload["tools"] = json!(tools_to_anthropic_spec(tools));
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }

        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            return Err(anyhow!("Anthropic API error: {}", error));
        }

        let message = anthropic_response_to_message(&response)?;
        let usage = Self::get_usage(&response);
        tracing::debug!(
            input_tokens = ?usage.input_tokens,
            output_tokens = ?usage.output_tokens,
            "model turn complete"
        );

        Ok((message, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(host: String) -> AnthropicProviderConfig {
        AnthropicProviderConfig {
            host,
            api_key: "test_api_key".to_string(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            temperature: None,
            max_tokens: Some(1024),
            betas: vec!["computer-use-2024-10-22".to_string()],
        }
    }

    #[tokio::test]
    async fn test_complete_with_tool_round_trip() -> Result<()> {
        let mock_server = MockServer::start().await;

        let messages = vec![
            Message::user().with_text("Take a screenshot"),
            Message::assistant().with_tool_use("toolu_1", "computer", json!({"action": "screenshot"})),
            Message::user().with_tool_result("toolu_1", vec![Content::png("aW1n")], false),
        ];
        let tools = vec![ToolSpec::new("computer", "control the screen", json!({"type": "object"}))];

        let expected_request_body = json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 1024,
            "system": "You are a desktop agent.",
            "messages": [
                {"role": "user", "content": [{"type": "text", "text": "Take a screenshot"}]},
                {"role": "assistant", "content": [{
                    "type": "tool_use", "id": "toolu_1", "name": "computer",
                    "input": {"action": "screenshot"}
                }]},
                {"role": "user", "content": [{
                    "type": "tool_result", "tool_use_id": "toolu_1", "is_error": false,
                    "content": [{"type": "image", "source": {
                        "type": "base64", "media_type": "image/png", "data": "aW1n"
                    }}]
                }]}
            ],
            "tools": [{
                "name": "computer", "description": "control the screen",
                "input_schema": {"type": "object"}
            }]
        });

        let response_body = json!({
            "id": "msg_123",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "I'll click the button."},
                {"type": "tool_use", "id": "toolu_2", "name": "computer",
                 "input": {"action": "left_click"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 15}
        });

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test_api_key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(header("anthropic-beta", "computer-use-2024-10-22"))
            .and(body_json(expected_request_body))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = AnthropicProvider::new(config(mock_server.uri()))?;
        let (message, usage) = provider
            .complete("You are a desktop agent.", &messages, &tools)
            .await?;

        assert_eq!(message.texts(), vec!["I'll click the button."]);
        let uses = message.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].id, "toolu_2");
        assert_eq!(uses[0].input, json!({"action": "left_click"}));
        assert_eq!(usage, Usage::new(Some(12), Some(15), Some(27)));
        Ok(())
    }

    #[tokio::test]
    async fn test_rate_limit_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let provider = AnthropicProvider::new(config(mock_server.uri())).unwrap();
        let err = provider
            .complete("", &[Message::user().with_text("hi")], &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn test_unknown_blocks_are_skipped() -> Result<()> {
        let message = anthropic_response_to_message(&json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "done"}
            ]
        }))?;
        assert_eq!(message.content, vec![MessageContent::text("done")]);
        Ok(())
    }

    #[test]
    fn test_usage_out_of_range_is_dropped() {
        let usage = AnthropicProvider::get_usage(&json!({
            "usage": {"input_tokens": 5_000_000_000i64, "output_tokens": 7}
        }));
        assert_eq!(usage, Usage::new(None, Some(7), None));
    }

    #[test]
    fn test_missing_content_is_an_error() {
        assert!(anthropic_response_to_message(&json!({"type": "message"})).is_err());
    }
}
