use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use chatrelay_core::config::OpenAiConfig;
use chatrelay_core::{Role, Turn};

use crate::gateway::{ChatResult, CompletionGateway, GatewayError, ImageResult};

/// OpenAI chat-completions + image-generations gateway.
pub struct OpenAiGateway {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    temperature: f32,
    image_size: String,
    image_count: u32,
}

impl OpenAiGateway {
    pub fn new(config: &OpenAiConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            temperature: config.temperature,
            image_size: config.image_size.clone(),
            image_count: config.image_count,
        })
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<String, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;

        if !(200..300).contains(&status) {
            warn!(status, body = %text, path, "OpenAI API error");
            return Err(GatewayError::Api {
                status,
                message: error_message(&text).unwrap_or(text),
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl CompletionGateway for OpenAiGateway {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat_complete(&self, window: &[Turn]) -> Result<ChatResult, GatewayError> {
        let body = build_chat_body(&self.chat_model, self.temperature, window);
        debug!(model = %self.chat_model, turns = window.len(), "sending chat request to OpenAI");
        let text = self.post("/v1/chat/completions", &body).await?;
        parse_chat_response(&text)
    }

    async fn generate_images(&self, prompt: &str) -> Result<ImageResult, GatewayError> {
        if prompt.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("empty image prompt".into()));
        }
        let body = build_image_body(prompt, self.image_count, &self.image_size);
        debug!(size = %self.image_size, n = self.image_count, "sending image request to OpenAI");
        let text = self.post("/v1/images/generations", &body).await?;
        parse_image_response(&text)
    }
}

fn build_chat_body(model: &str, temperature: f32, window: &[Turn]) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = window
        .iter()
        .map(|t| {
            serde_json::json!({
                "role": t.role,
                "content": t.content,
            })
        })
        .collect();

    serde_json::json!({
        "model": model,
        "messages": messages,
        "temperature": temperature,
    })
}

fn build_image_body(prompt: &str, n: u32, size: &str) -> serde_json::Value {
    serde_json::json!({
        "prompt": prompt,
        "n": n,
        "size": size,
    })
}

/// Decode a 2xx chat body. An error payload wins over choices.
fn parse_chat_response(body: &str) -> Result<ChatResult, GatewayError> {
    let resp: ChatResponseBody =
        serde_json::from_str(body).map_err(|e| GatewayError::Parse(e.to_string()))?;

    if let Some(message) = resp.error.and_then(|e| e.message) {
        return Err(GatewayError::Upstream(message));
    }

    let reply = resp
        .choices
        .into_iter()
        .filter_map(|c| c.message)
        .find_map(|m| m.content.map(|content| (m.role, content)));

    Ok(match reply {
        Some((role, text)) => ChatResult {
            role: role.unwrap_or(Role::Assistant),
            text,
        },
        None => ChatResult {
            role: Role::Assistant,
            text: String::new(),
        },
    })
}

fn parse_image_response(body: &str) -> Result<ImageResult, GatewayError> {
    let resp: ImageResponseBody =
        serde_json::from_str(body).map_err(|e| GatewayError::Parse(e.to_string()))?;

    if let Some(message) = resp.error.and_then(|e| e.message) {
        return Err(GatewayError::Upstream(message));
    }

    Ok(ImageResult {
        urls: resp.data.into_iter().filter_map(|d| d.url).collect(),
    })
}

/// Pull `error.message` out of an arbitrary error body, if it is JSON.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error)
        .and_then(|e| e.message)
}

// OpenAI response types (deserialization only)

#[derive(Deserialize)]
struct ChatResponseBody {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    role: Option<Role>,
    content: Option<String>,
}

#[derive(Deserialize)]
struct ImageResponseBody {
    #[serde(default)]
    data: Vec<ImageData>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
}
