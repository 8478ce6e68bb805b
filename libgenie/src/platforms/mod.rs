//! Publish transport abstraction
//!
//! [`Platform`] is everything the bot needs from the microblogging service:
//! publishing, replying, uploading media and reading posts back. Any
//! operation may fail with [`PlatformError::RateLimit`](crate::error::PlatformError::RateLimit),
//! which callers turn into a lockout rather than a retry.
//!
//! # Examples
//!
//! ```no_run
//! use libgenie::platforms::{Platform, x::XClient};
//!
//! # async fn example() -> libgenie::Result<()> {
//! let mut platform = XClient::new("user-access-token".to_string(), None)?;
//! platform.authenticate().await?;
//!
//! let id = platform.post("Hello from the agent", &[]).await?;
//! println!("Posted: {}", id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Tweet;

pub mod mock;
pub mod x;

#[async_trait]
pub trait Platform: Send + Sync {
    /// Establish the session and resolve the authenticated account
    ///
    /// Must be called before [`Platform::get_mentions`].
    async fn authenticate(&mut self) -> Result<()>;

    /// Publish a new post, optionally with previously uploaded media
    ///
    /// Returns the platform id of the new post.
    async fn post(&self, text: &str, media_ids: &[String]) -> Result<String>;

    /// Publish `text` as a reply to `parent_id`
    async fn reply(&self, parent_id: &str, text: &str) -> Result<String>;

    /// Upload image bytes, returning a media id usable in [`Platform::post`]
    async fn upload_media(&self, bytes: &[u8]) -> Result<String>;

    /// Recent posts matching `query`, at most `limit` of them
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Tweet>>;

    /// Posts mentioning the authenticated account, newer than `since_id`
    async fn get_mentions(&self, since_id: Option<&str>) -> Result<Vec<Tweet>>;

    /// Look a post up by id. `Ok(None)` if it does not exist.
    async fn get_by_id(&self, id: &str) -> Result<Option<Tweet>>;

    /// Lowercase platform identifier
    fn name(&self) -> &str;

    /// Maximum characters per post, if the platform enforces one
    fn character_limit(&self) -> Option<usize>;
}
