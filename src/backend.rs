use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::RuntimeConfig;

pub const DEFAULT_MODELS_ENDPOINT: &str = "/api/models";
pub const DEFAULT_CHAT_ENDPOINT: &str = "/api/chat";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableModel {
    pub id: String,
    #[serde(default)]
    pub endpoint_id: Option<String>,
}

impl AvailableModel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint_id: None,
        }
    }

    pub fn matches(&self, model_id: &str) -> bool {
        self.id == model_id || self.endpoint_id.as_deref() == Some(model_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageOptions {
    pub agent_type: String,
    pub model_preference: String,
    pub workflow_id: String,
    pub specialties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub response: String,
}

/// Remote model API: availability listing plus single-shot message send.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn available_models(&self) -> Result<Vec<AvailableModel>>;

    async fn send_message(&self, prompt: &str, options: &MessageOptions) -> Result<MessageReply>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub code: &'static str,
    pub message: String,
}

impl BackendError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "backend {}: {}", self.code, self.message)
    }
}

impl std::error::Error for BackendError {}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServiceEndpoints {
    pub models: Option<String>,
    pub chat: Option<String>,
    #[serde(default, flatten)]
    pub other: HashMap<String, Value>,
}

/// Backend-service descriptor (`backend-service.json`).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServiceDescriptor {
    pub base_url: String,
    #[serde(default)]
    pub endpoints: ServiceEndpoints,
    #[serde(default)]
    pub security: HashMap<String, Value>,
    #[serde(default)]
    pub monitoring: HashMap<String, Value>,
}

pub fn load_service_descriptor(path: &Path) -> Result<ServiceDescriptor> {
    let content = std::fs::read_to_string(path).with_context(|| {
        format!(
            "failed to read backend service descriptor at '{}'",
            path.display()
        )
    })?;
    serde_json::from_str::<ServiceDescriptor>(&content).with_context(|| {
        format!(
            "invalid backend service descriptor json at '{}'",
            path.display()
        )
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModelsPayload {
    Bare(Vec<AvailableModel>),
    Wrapped { models: Vec<AvailableModel> },
}

pub fn parse_models_payload(body: &str) -> Result<Vec<AvailableModel>, BackendError> {
    match serde_json::from_str::<ModelsPayload>(body) {
        Ok(ModelsPayload::Bare(models)) | Ok(ModelsPayload::Wrapped { models }) => Ok(models),
        Err(err) => Err(BackendError::new(
            "decode",
            format!("invalid models payload: {err}"),
        )),
    }
}

pub fn join_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    models_url: String,
    chat_url: String,
    api_key: Option<String>,
}

impl HttpBackend {
    pub fn new(
        descriptor: &ServiceDescriptor,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = descriptor.base_url.trim();
        if base_url.is_empty() {
            return Err(anyhow::anyhow!(
                "backend base_url is empty. Set base_url in the service descriptor or --backend-url."
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build backend http client")?;
        let models_endpoint = descriptor
            .endpoints
            .models
            .as_deref()
            .unwrap_or(DEFAULT_MODELS_ENDPOINT);
        let chat_endpoint = descriptor
            .endpoints
            .chat
            .as_deref()
            .unwrap_or(DEFAULT_CHAT_ENDPOINT);

        Ok(Self {
            client,
            models_url: join_url(base_url, models_endpoint),
            chat_url: join_url(base_url, chat_endpoint),
            api_key,
        })
    }

    pub fn from_config(cfg: &RuntimeConfig) -> Result<Self> {
        let service_path = Path::new(&cfg.service_path);
        let mut descriptor = if service_path.exists() {
            load_service_descriptor(service_path)?
        } else {
            ServiceDescriptor::default()
        };
        if let Some(url) = cfg.backend_url.as_deref() {
            descriptor.base_url = url.to_string();
        }
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Self::new(
            &descriptor,
            api_key,
            Duration::from_secs(cfg.request_timeout_secs.max(1)),
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn read_body(response: reqwest::Response) -> Result<String, BackendError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| BackendError::new("transport", err.to_string()))?;
        if !status.is_success() {
            let (snippet, _) = truncate_text(body.trim(), 200);
            return Err(BackendError::new(
                "http_status",
                format!("status {status}: {snippet}"),
            ));
        }
        Ok(body)
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::new("timeout", err.to_string())
    } else {
        BackendError::new("transport", err.to_string())
    }
}

pub fn truncate_text(text: &str, max_chars: usize) -> (String, bool) {
    let mut iter = text.chars();
    let truncated = iter.by_ref().take(max_chars).collect::<String>();
    if iter.next().is_some() {
        (truncated, true)
    } else {
        (text.to_string(), false)
    }
}

#[async_trait]
impl ModelBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn available_models(&self) -> Result<Vec<AvailableModel>> {
        let response = self
            .authorize(self.client.get(&self.models_url))
            .send()
            .await
            .map_err(classify_reqwest_error)
            .with_context(|| format!("failed to fetch available models from '{}'", self.models_url))?;
        let body = Self::read_body(response)
            .await
            .with_context(|| format!("failed to fetch available models from '{}'", self.models_url))?;
        let models = parse_models_payload(&body)?;
        tracing::debug!(count = models.len(), url = %self.models_url, "fetched available models");
        Ok(models)
    }

    async fn send_message(&self, prompt: &str, options: &MessageOptions) -> Result<MessageReply> {
        let payload = json!({
            "message": prompt,
            "agent_type": options.agent_type,
            "model_preference": options.model_preference,
            "workflow_id": options.workflow_id,
            "specialties": options.specialties,
        });
        let response = self
            .authorize(self.client.post(&self.chat_url).json(&payload))
            .send()
            .await
            .map_err(classify_reqwest_error)
            .with_context(|| format!("failed to send message to '{}'", self.chat_url))?;
        let body = Self::read_body(response)
            .await
            .with_context(|| format!("failed to send message to '{}'", self.chat_url))?;
        serde_json::from_str::<MessageReply>(&body)
            .map_err(|err| BackendError::new("decode", format!("invalid chat reply: {err}")))
            .with_context(|| format!("failed to decode reply from '{}'", self.chat_url))
    }
}
