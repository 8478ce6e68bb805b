//! AI text generation
//!
//! [`TextProvider`] is the single contract every generation backend meets.
//! [`AiService`] routes requests to a primary provider and fails over to a
//! secondary one, keeping per-conversation history across both.

pub mod gemini;
pub mod mock;
pub mod openai;
pub mod router;

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, GenieError, Result};

pub use router::{AiService, ConversationStore, IMAGE_PROMPT_MAX_CHARS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A text generation backend
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Provider identifier, e.g. "groq"
    fn name(&self) -> &str;

    /// Model the provider was configured with
    fn model(&self) -> &str;

    /// Generate the next assistant turn for `messages`
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Known provider backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Groq,
    HuggingFace,
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "groq",
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Default model when the configuration does not name one
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "llama-3.1-8b-instant",
            ProviderKind::HuggingFace => "Qwen/Qwen3-Coder-30B-A3B-Instruct",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Gemini => "gemini-2.5-flash",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = GenieError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(ProviderKind::Groq),
            "huggingface" | "hf" => Ok(ProviderKind::HuggingFace),
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            other => Err(ConfigError::InvalidValue(format!(
                "Unknown AI provider '{}'. Valid options: groq, huggingface, openai, gemini",
                other
            ))
            .into()),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider settings, fixed for the lifetime of an [`AiService`]
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider_name: String,
    pub api_key: String,
    pub model_name: String,
    /// Override for the provider's API root (tests, proxies)
    pub base_url: Option<String>,
    pub fallback_provider_name: Option<String>,
    pub fallback_api_key: Option<String>,
    pub fallback_model_name: Option<String>,
    pub fallback_base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider_name: &str, api_key: &str, model_name: &str) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            api_key: api_key.to_string(),
            model_name: model_name.to_string(),
            base_url: None,
            fallback_provider_name: None,
            fallback_api_key: None,
            fallback_model_name: None,
            fallback_base_url: None,
        }
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback_provider_name.is_some()
            || self.fallback_api_key.is_some()
            || self.fallback_model_name.is_some()
    }
}

/// Build the concrete transport for `kind`
pub fn build_provider(
    kind: ProviderKind,
    api_key: String,
    model: String,
    base_url: Option<String>,
) -> Result<Box<dyn TextProvider>> {
    let provider: Box<dyn TextProvider> = match kind {
        ProviderKind::Gemini => Box::new(gemini::GeminiProvider::new(api_key, model, base_url)?),
        _ => Box::new(openai::OpenAiCompatProvider::new(kind, api_key, model, base_url)?),
    };
    Ok(provider)
}
