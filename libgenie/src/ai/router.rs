//! Provider failover and conversation memory

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::{build_provider, ChatMessage, ProviderConfig, ProviderKind, TextProvider};
use crate::error::{GenieError, ProviderError, Result};
use crate::prompts;
use crate::retry::RetryPolicy;

/// Image generation APIs reject prompts longer than this
pub const IMAGE_PROMPT_MAX_CHARS: usize = 500;

/// Per-conversation history, keyed by conversation id
///
/// Grows for the lifetime of the process; nothing is evicted.
#[derive(Debug, Default)]
pub struct ConversationStore {
    turns: HashMap<String, Vec<ChatMessage>>,
}

impl ConversationStore {
    /// Prior turns for `id`, oldest first
    pub fn history(&self, id: &str) -> &[ChatMessage] {
        self.turns.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append one prompt/response exchange, creating the conversation if needed
    pub fn append(&mut self, id: &str, prompt: &str, response: &str) {
        let turns = self.turns.entry(id.to_string()).or_default();
        turns.push(ChatMessage::user(prompt));
        turns.push(ChatMessage::assistant(response));
    }

    /// Number of tracked conversations
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

fn same_identity(a: &dyn TextProvider, b: &dyn TextProvider) -> bool {
    a.name() == b.name() && a.model() == b.model()
}

/// Routes generation to a primary provider with one fallback attempt
pub struct AiService {
    primary: Box<dyn TextProvider>,
    fallback: Option<Box<dyn TextProvider>>,
    retry: RetryPolicy,
    conversations: ConversationStore,
}

impl AiService {
    /// A fallback identical to the primary (same provider and model) is dropped.
    pub fn new(primary: Box<dyn TextProvider>, fallback: Option<Box<dyn TextProvider>>) -> Self {
        let fallback = fallback.filter(|fb| {
            let distinct = !same_identity(primary.as_ref(), fb.as_ref());
            if !distinct {
                debug!(
                    "Fallback {} ({}) is the primary provider, ignoring it",
                    fb.name(),
                    fb.model()
                );
            }
            distinct
        });

        Self {
            primary,
            fallback,
            retry: RetryPolicy::once(),
            conversations: ConversationStore::default(),
        }
    }

    /// Build providers from configuration
    ///
    /// Fallback fields left unset inherit the primary's values.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let kind: ProviderKind = config.provider_name.parse()?;
        let primary = build_provider(
            kind,
            config.api_key.clone(),
            config.model_name.clone(),
            config.base_url.clone(),
        )?;

        let fallback = if config.has_fallback() {
            let fallback_kind: ProviderKind = match &config.fallback_provider_name {
                Some(name) => name.parse()?,
                None => kind,
            };
            let model = config.fallback_model_name.clone().unwrap_or_else(|| {
                if fallback_kind == kind {
                    config.model_name.clone()
                } else {
                    fallback_kind.default_model().to_string()
                }
            });
            let api_key = config
                .fallback_api_key
                .clone()
                .unwrap_or_else(|| config.api_key.clone());
            let base_url = config
                .fallback_base_url
                .clone()
                .or_else(|| (fallback_kind == kind).then(|| config.base_url.clone()).flatten());
            Some(build_provider(fallback_kind, api_key, model, base_url)?)
        } else {
            None
        };

        Ok(Self::new(primary, fallback))
    }

    /// Retry policy applied to each individual provider call
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Generate a response, replaying prior turns of `conversation_id`
    ///
    /// Returns `None` when neither provider produced text. On success the
    /// exchange is appended to the conversation.
    pub async fn generate_response(
        &mut self,
        prompt: &str,
        conversation_id: Option<&str>,
    ) -> Option<String> {
        let mut messages: Vec<ChatMessage> = conversation_id
            .map(|id| self.conversations.history(id).to_vec())
            .unwrap_or_default();
        messages.push(ChatMessage::user(prompt));

        let response = self.route(&messages).await?;

        if let Some(id) = conversation_id {
            self.conversations.append(id, prompt, &response);
        }
        Some(response)
    }

    /// Generate a free-form image prompt about `topic`, capped for image APIs
    pub async fn generate_image_prompt(
        &mut self,
        topic: &str,
        grounding_text: Option<&str>,
    ) -> Option<String> {
        let request = prompts::image_prompt_request(topic, grounding_text);
        let text = self.generate_response(&request, None).await?;
        let image_prompt = prompts::truncate_chars(&text, IMAGE_PROMPT_MAX_CHARS);

        info!("Generated image prompt: {}", image_prompt);
        Some(image_prompt)
    }

    async fn route(&self, messages: &[ChatMessage]) -> Option<String> {
        if let Some(text) = self.attempt(self.primary.as_ref(), messages).await {
            return Some(text);
        }

        let Some(fallback) = self.fallback.as_deref() else {
            warn!(
                "{} ({}) failed and no fallback is configured",
                self.primary.name(),
                self.primary.model()
            );
            return None;
        };

        info!(
            "Falling back from {} ({}) to {} ({})",
            self.primary.name(),
            self.primary.model(),
            fallback.name(),
            fallback.model()
        );
        let result = self.attempt(fallback, messages).await;
        if result.is_none() {
            warn!("Fallback {} ({}) also failed", fallback.name(), fallback.model());
        }
        result
    }

    async fn attempt(&self, provider: &dyn TextProvider, messages: &[ChatMessage]) -> Option<String> {
        let label = format!("{} ({}) generation", provider.name(), provider.model());

        self.retry
            .run(&label, || async {
                let text = provider.complete(messages).await?;
                let text = text.trim();
                if text.is_empty() {
                    return Err(GenieError::from(ProviderError::InvalidResponse(format!(
                        "{} returned an empty response",
                        provider.name()
                    ))));
                }
                Ok::<String, GenieError>(text.to_string())
            })
            .await
            .ok()
    }
}
