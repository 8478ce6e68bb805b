//! OpenAI-compatible chat completions (Groq, Hugging Face router, OpenAI)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatMessage, ProviderKind, Role, TextProvider};
use crate::error::{ProviderError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_TOKENS: u32 = 1024;
const TEMPERATURE: f32 = 0.8;

fn default_base_url(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Groq => "https://api.groq.com/openai/v1",
        ProviderKind::HuggingFace => "https://router.huggingface.co/v1",
        _ => "https://api.openai.com/v1",
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Map an HTTP failure from any provider to a [`ProviderError`]
pub(crate) fn map_provider_status(provider: &str, status: StatusCode, body: &str) -> ProviderError {
    let detail = format!("{} returned {}: {}", provider, status, body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication(detail),
        s if s.is_server_error() => ProviderError::Network(detail),
        _ => ProviderError::Request(detail),
    }
}

pub struct OpenAiCompatProvider {
    kind: ProviderKind,
    http: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenAiCompatProvider {
    pub fn new(
        kind: ProviderKind,
        api_key: String,
        model: String,
        base_url: Option<String>,
    ) -> Result<Self> {
        if kind == ProviderKind::Gemini {
            return Err(ProviderError::Unsupported(
                "gemini does not speak the chat completions protocol".to_string(),
            )
            .into());
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = base_url
            .unwrap_or_else(|| default_base_url(kind).to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            kind,
            http,
            api_key: SecretString::from(api_key),
            model,
            base_url,
        })
    }
}

#[async_trait]
impl TextProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: match m.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    content: &m.content,
                })
                .collect(),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        debug!(
            "{} request: model={}, turns={}",
            self.kind,
            self.model,
            messages.len()
        );

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("{} request failed: {}", self.kind, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_provider_status(self.kind.as_str(), status, &body).into());
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("{} response: {}", self.kind, e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ProviderError::InvalidResponse(format!("{} returned no choices", self.kind)).into()
            })
    }
}
