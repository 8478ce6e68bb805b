//! Scripted text provider for testing

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{ChatMessage, TextProvider};
use crate::error::{ProviderError, Result};

#[derive(Debug, Default)]
struct MockProviderState {
    script: VecDeque<std::result::Result<String, ProviderError>>,
    requests: Vec<Vec<ChatMessage>>,
}

/// Provider that replays a queue of scripted responses and failures
///
/// Clones share state, so a test can keep a handle after boxing one copy
/// into an [`AiService`](super::AiService). An exhausted script answers
/// with a request error.
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    model: String,
    state: Arc<Mutex<MockProviderState>>,
}

impl MockProvider {
    pub fn new(name: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            state: Arc::new(Mutex::new(MockProviderState::default())),
        }
    }

    /// Queue successful responses
    pub fn respond_with<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for response in responses {
            self.push_response(response);
        }
        self
    }

    /// Queue failures
    pub fn fail_with<I>(self, errors: I) -> Self
    where
        I: IntoIterator<Item = ProviderError>,
    {
        for error in errors {
            self.push_failure(error);
        }
        self
    }

    pub fn push_response(&self, response: impl Into<String>) {
        self.lock().script.push_back(Ok(response.into()));
    }

    pub fn push_failure(&self, error: ProviderError) {
        self.lock().script.push_back(Err(error));
    }

    /// Number of `complete` calls so far
    pub fn calls(&self) -> usize {
        self.lock().requests.len()
    }

    /// Message lists received, one entry per call
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockProviderState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TextProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut state = self.lock();
        state.requests.push(messages.to_vec());
        match state.script.pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(e.into()),
            None => Err(ProviderError::Request(format!(
                "{} mock has no scripted response left",
                self.name
            ))
            .into()),
        }
    }
}
