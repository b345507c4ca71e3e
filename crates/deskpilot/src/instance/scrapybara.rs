use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{BashRequest, ComputerAction, EditRequest, Instance, InstanceLauncher, InstanceSize};
use crate::tools::ToolOutput;

pub const SCRAPYBARA_HOST: &str = "https://api.scrapybara.com/v1";

#[derive(Debug, Clone)]
pub struct ScrapybaraConfig {
    pub host: String,
    pub api_key: String,
}

impl ScrapybaraConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            host: SCRAPYBARA_HOST.to_string(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Clone)]
struct Api {
    client: Client,
    config: ScrapybaraConfig,
}

impl Api {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.host.trim_end_matches('/'), path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .header("x-api-key", &self.config.api_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let err_text = response.text().await.unwrap_or_default();
                Err(anyhow!("Request failed: {}: {}", status, err_text))
            }
        }
    }

    async fn post(&self, path: &str, payload: Value) -> Result<Value> {
        self.send(self.client.post(self.url(path)).json(&payload)).await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.send(self.client.get(self.url(path))).await
    }
}

/// Wire shape of every tool-like instance endpoint
#[derive(Debug, Default, Deserialize)]
struct ActionResponse {
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    base64_image: Option<String>,
}

impl From<ActionResponse> for ToolOutput {
    fn from(response: ActionResponse) -> Self {
        ToolOutput {
            output: response.output,
            error: response.error,
            base64_image: response.base64_image,
        }
    }
}

/// Starts instances on the Scrapybara API
pub struct ScrapybaraClient {
    api: Api,
}

impl ScrapybaraClient {
    pub fn new(config: ScrapybaraConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self {
            api: Api { client, config },
        })
    }
}

#[async_trait]
impl InstanceLauncher for ScrapybaraClient {
    async fn start(&self, size: InstanceSize) -> Result<Arc<dyn Instance>> {
        let response = self
            .api
            .post("start", json!({ "instance_type": size.as_str() }))
            .await?;

        let id = response
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("Invalid response format from start: missing id"))?
            .to_string();

        tracing::info!(instance = %id, size = %size, "instance started");
        Ok(Arc::new(ScrapybaraInstance {
            api: self.api.clone(),
            id,
        }))
    }
}

pub struct ScrapybaraInstance {
    api: Api,
    id: String,
}

impl ScrapybaraInstance {
    fn path(&self, endpoint: &str) -> String {
        format!("instance/{}/{}", self.id, endpoint)
    }

    async fn action(&self, endpoint: &str, payload: Value) -> Result<ToolOutput> {
        let response = self.api.post(&self.path(endpoint), payload).await?;
        let parsed: ActionResponse = serde_json::from_value(response)?;
        Ok(parsed.into())
    }
}

#[async_trait]
impl Instance for ScrapybaraInstance {
    fn id(&self) -> &str {
        &self.id
    }

    async fn stream_url(&self) -> Result<String> {
        let response = self.api.get(&self.path("stream_url")).await?;
        response
            .get("stream_url")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| anyhow!("Invalid response format from stream_url"))
    }

    async fn bash(&self, request: &BashRequest) -> Result<ToolOutput> {
        self.action("bash", serde_json::to_value(request)?).await
    }

    async fn computer(&self, action: &ComputerAction) -> Result<ToolOutput> {
        self.action("computer", serde_json::to_value(action)?).await
    }

    async fn edit(&self, request: &EditRequest) -> Result<ToolOutput> {
        self.action("edit", serde_json::to_value(request)?).await
    }

    async fn browser_start(&self) -> Result<String> {
        let response = self.api.post(&self.path("browser/start"), json!({})).await?;
        response
            .get("cdp_url")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| anyhow!("Invalid response format from browser/start"))
    }

    async fn browser_authenticate(&self, auth_state_id: &str) -> Result<()> {
        let request = self
            .api
            .client
            .post(self.api.url(&self.path("browser/authenticate")))
            .query(&[("auth_state_id", auth_state_id)]);
        self.api.send(request).await?;
        Ok(())
    }

    async fn browser_stop(&self) -> Result<()> {
        self.api.post(&self.path("browser/stop"), json!({})).await?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.api.post(&self.path("stop"), json!({})).await?;
        tracing::info!(instance = %self.id, "instance stopped");
        Ok(())
    }
}
