//! Mock platform implementation for testing
//!
//! A scriptable in-memory [`Platform`]. Clones share state, so a test can
//! hand one clone to the bot and inspect another afterwards. Failures are
//! queued per operation and consumed one call at a time.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{PlatformError, Result};
use crate::platforms::Platform;
use crate::types::Tweet;

/// A publish the mock accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub id: String,
    pub text: String,
    pub in_reply_to: Option<String>,
    pub media_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    authenticated: bool,
    publish_failures: VecDeque<PlatformError>,
    upload_failures: VecDeque<PlatformError>,
    auth_failure: Option<PlatformError>,
    search_failures: VecDeque<PlatformError>,
    mention_failures: VecDeque<PlatformError>,
    lookup_failures: VecDeque<PlatformError>,
    search_results: Vec<Tweet>,
    mentions: Vec<Tweet>,
    tweets: HashMap<String, Tweet>,
    published: Vec<Published>,
    uploads: Vec<usize>,
    publish_calls: usize,
    upload_calls: usize,
    mention_queries: Vec<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct MockPlatform {
    name: String,
    character_limit: Option<usize>,
    state: Arc<Mutex<MockState>>,
}

impl MockPlatform {
    /// A mock that accepts everything
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            character_limit: Some(280),
            state: Arc::new(Mutex::new(MockState {
                next_id: 1_000,
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue failures for the next post/reply calls, in order
    pub fn fail_publishes(&self, errors: impl IntoIterator<Item = PlatformError>) -> &Self {
        self.state().publish_failures.extend(errors);
        self
    }

    /// Queue failures for the next media uploads, in order
    pub fn fail_uploads(&self, errors: impl IntoIterator<Item = PlatformError>) -> &Self {
        self.state().upload_failures.extend(errors);
        self
    }

    /// Make the next `authenticate` call fail
    pub fn fail_authentication(&self, error: PlatformError) -> &Self {
        self.state().auth_failure = Some(error);
        self
    }

    pub fn fail_searches(&self, errors: impl IntoIterator<Item = PlatformError>) -> &Self {
        self.state().search_failures.extend(errors);
        self
    }

    pub fn fail_mention_queries(&self, errors: impl IntoIterator<Item = PlatformError>) -> &Self {
        self.state().mention_failures.extend(errors);
        self
    }

    pub fn fail_lookups(&self, errors: impl IntoIterator<Item = PlatformError>) -> &Self {
        self.state().lookup_failures.extend(errors);
        self
    }

    /// Make a post visible to search and lookup
    pub fn add_search_result(&self, tweet: Tweet) -> &Self {
        let mut state = self.state();
        state.tweets.insert(tweet.id.clone(), tweet.clone());
        state.search_results.push(tweet);
        self
    }

    /// Make a post visible as a mention and to lookup
    pub fn add_mention(&self, tweet: Tweet) -> &Self {
        let mut state = self.state();
        state.tweets.insert(tweet.id.clone(), tweet.clone());
        state.mentions.push(tweet);
        self
    }

    pub fn published(&self) -> Vec<Published> {
        self.state().published.clone()
    }

    pub fn publish_calls(&self) -> usize {
        self.state().publish_calls
    }

    pub fn upload_calls(&self) -> usize {
        self.state().upload_calls
    }

    /// Sizes of successfully uploaded media, in bytes
    pub fn uploads(&self) -> Vec<usize> {
        self.state().uploads.clone()
    }

    /// `since_id` values passed to each mentions query
    pub fn mention_queries(&self) -> Vec<Option<String>> {
        self.state().mention_queries.clone()
    }

    fn publish(&self, text: &str, in_reply_to: Option<&str>, media_ids: &[String]) -> Result<String> {
        let mut state = self.state();
        state.publish_calls += 1;

        if let Some(error) = state.publish_failures.pop_front() {
            return Err(error.into());
        }

        state.next_id += 1;
        let id = state.next_id.to_string();
        state.published.push(Published {
            id: id.clone(),
            text: text.to_string(),
            in_reply_to: in_reply_to.map(str::to_string),
            media_ids: media_ids.to_vec(),
        });
        Ok(id)
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn authenticate(&mut self) -> Result<()> {
        let mut state = self.state();
        if let Some(error) = state.auth_failure.take() {
            return Err(error.into());
        }
        state.authenticated = true;
        Ok(())
    }

    async fn post(&self, text: &str, media_ids: &[String]) -> Result<String> {
        self.publish(text, None, media_ids)
    }

    async fn reply(&self, parent_id: &str, text: &str) -> Result<String> {
        self.publish(text, Some(parent_id), &[])
    }

    async fn upload_media(&self, bytes: &[u8]) -> Result<String> {
        let mut state = self.state();
        state.upload_calls += 1;

        if let Some(error) = state.upload_failures.pop_front() {
            return Err(error.into());
        }

        state.uploads.push(bytes.len());
        Ok(format!("media-{}", state.uploads.len()))
    }

    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<Tweet>> {
        let mut state = self.state();
        if let Some(error) = state.search_failures.pop_front() {
            return Err(error.into());
        }
        Ok(state.search_results.iter().take(limit).cloned().collect())
    }

    async fn get_mentions(&self, since_id: Option<&str>) -> Result<Vec<Tweet>> {
        let mut state = self.state();
        if !state.authenticated {
            return Err(PlatformError::Authentication("Not authenticated".to_string()).into());
        }
        if let Some(error) = state.mention_failures.pop_front() {
            return Err(error.into());
        }
        state.mention_queries.push(since_id.map(str::to_string));

        let since = since_id.and_then(|id| id.parse::<u64>().ok());
        Ok(state
            .mentions
            .iter()
            .filter(|t| match (since, t.id.parse::<u64>()) {
                (Some(since), Ok(id)) => id > since,
                _ => true,
            })
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Tweet>> {
        let mut state = self.state();
        if let Some(error) = state.lookup_failures.pop_front() {
            return Err(error.into());
        }
        Ok(state.tweets.get(id).cloned())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn character_limit(&self) -> Option<usize> {
        self.character_limit
    }
}
