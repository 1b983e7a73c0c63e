//! Scrapybara instance service client

use super::{InstanceApi, InstanceHandle, InstanceKind};
use crate::tools::{BashRequest, ComputerAction, EditCommand};
use crate::transcript::ToolOutput;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vmpilot_error::{Error, ErrorKind, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.scrapybara.com/v1";

/// HTTP client for the Scrapybara API
pub struct ScrapybaraClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ScrapybaraClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            // screenshots and long shell commands are slow
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| {
                Error::new(ErrorKind::NetworkFailed, "failed to create HTTP client")
                    .with_operation("scrapybara::new")
                    .set_source(e)
            })?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, path: &str, body: &B, operation: &'static str) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| network_error(operation, e))?;

        decode(response, operation).await
    }

    async fn get<R: DeserializeOwned>(&self, path: &str, operation: &'static str) -> Result<R> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| network_error(operation, e))?;

        decode(response, operation).await
    }
}

fn network_error(operation: &'static str, err: reqwest::Error) -> Error {
    Error::new(ErrorKind::NetworkFailed, err.to_string())
        .with_operation(operation)
        .set_source(err)
}

async fn decode<R: DeserializeOwned>(response: reqwest::Response, operation: &'static str) -> Result<R> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let kind = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::AuthenticationFailed,
            StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimited,
            _ => ErrorKind::InstanceFailed,
        };
        return Err(Error::new(kind, text)
            .with_operation(operation)
            .with_context("status", status.as_u16().to_string()));
    }

    response.json::<R>().await.map_err(|e| {
        Error::new(ErrorKind::ParseFailed, "malformed response from instance service")
            .with_operation(operation)
            .set_source(e)
    })
}

#[derive(Debug, Serialize)]
struct StartRequest {
    instance_type: InstanceKind,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StreamUrlResponse {
    stream_url: String,
}

#[derive(Debug, Deserialize)]
struct StopResponse {
    #[serde(default)]
    status: Option<String>,
}

impl InstanceApi for ScrapybaraClient {
    async fn start(&self, kind: InstanceKind) -> Result<InstanceHandle> {
        let started: StartResponse = self
            .post("/start", &StartRequest { instance_type: kind }, "instance::start")
            .await?;
        tracing::info!(instance = %started.id, kind = %kind, "instance started");
        Ok(InstanceHandle::new(started.id, kind))
    }

    async fn stream_url(&self, instance: &InstanceHandle) -> Result<String> {
        let response: StreamUrlResponse = self
            .get(&format!("/instance/{}/stream_url", instance.id), "instance::stream_url")
            .await?;
        Ok(response.stream_url)
    }

    async fn computer(&self, instance: &InstanceHandle, action: &ComputerAction) -> Result<ToolOutput> {
        self.post(&format!("/instance/{}/computer", instance.id), action, "instance::computer")
            .await
            .map_err(|e| e.with_context("instance", instance.id.clone()))
    }

    async fn bash(&self, instance: &InstanceHandle, request: &BashRequest) -> Result<ToolOutput> {
        self.post(&format!("/instance/{}/bash", instance.id), request, "instance::bash")
            .await
            .map_err(|e| e.with_context("instance", instance.id.clone()))
    }

    async fn edit(&self, instance: &InstanceHandle, command: &EditCommand) -> Result<ToolOutput> {
        self.post(&format!("/instance/{}/edit", instance.id), command, "instance::edit")
            .await
            .map_err(|e| e.with_context("instance", instance.id.clone()))
    }

    async fn stop(&self, instance: &InstanceHandle) -> Result<()> {
        let response: StopResponse = self
            .post(&format!("/instance/{}/stop", instance.id), &serde_json::json!({}), "instance::stop")
            .await?;
        tracing::info!(
            instance = %instance.id,
            status = response.status.as_deref().unwrap_or("stopped"),
            "instance stopped"
        );
        Ok(())
    }
}
