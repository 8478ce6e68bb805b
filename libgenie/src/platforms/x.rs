//! X (Twitter) API v2 client
//!
//! Authenticates with an OAuth 2.0 user-context access token. HTTP status
//! codes are mapped onto [`PlatformError`] so that throttling (429) stays
//! distinguishable from ordinary failures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PlatformError, Result};
use crate::platforms::Platform;
use crate::types::{ImageMimeType, Tweet};

pub const DEFAULT_BASE_URL: &str = "https://api.x.com";

/// Hard cap the API places on post length
const CHARACTER_LIMIT: usize = 280;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Search rejects `max_results` outside this range
const SEARCH_MIN_RESULTS: usize = 10;
const SEARCH_MAX_RESULTS: usize = 100;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
}

#[derive(Debug, Serialize)]
struct CreateTweet<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<MediaRef<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<ReplyRef<'a>>,
}

#[derive(Debug, Serialize)]
struct MediaRef<'a> {
    media_ids: &'a [String],
}

#[derive(Debug, Serialize)]
struct ReplyRef<'a> {
    in_reply_to_tweet_id: &'a str,
}

/// Map a non-success HTTP response to a platform error
fn map_status(status: StatusCode, body: &str, context: &str) -> PlatformError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            PlatformError::RateLimit(format!("X throttled {}: {}", context, detail))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Authentication(
            format!("X rejected credentials during {}: {}", context, detail),
        ),
        StatusCode::NOT_FOUND => PlatformError::NotFound(format!("X {}: {}", context, detail)),
        s if s.is_server_error() => {
            PlatformError::Network(format!("X server error during {}: {}", context, detail))
        }
        _ => PlatformError::Posting(format!("X {} failed: {}", context, detail)),
    }
}

fn map_transport_error(error: reqwest::Error, context: &str) -> PlatformError {
    PlatformError::Network(format!("Could not reach X during {}: {}", context, error))
}

pub struct XClient {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    user_id: Option<String>,
}

impl XClient {
    /// Create a client for `base_url` (defaults to the public API)
    pub fn new(access_token: String, base_url: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            http,
            base_url,
            token: SecretString::from(access_token),
            user_id: None,
        })
    }

    /// Id of the authenticated account, once [`Platform::authenticate`] ran
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.token.expose_secret())
    }

    /// Send a request and decode the `data` member of a successful response
    ///
    /// A 404 or a success without `data` both come back as `Ok(None)`.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<Option<T>> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| map_transport_error(e, context))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, &body, context).into());
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            PlatformError::Posting(format!("Unexpected X response during {}: {}", context, e))
        })?;
        Ok(envelope.data)
    }

    async fn create_tweet(&self, body: &CreateTweet<'_>, context: &str) -> Result<String> {
        let request = self.http.post(self.url("/2/tweets")).json(body);
        let created: Option<IdOnly> = self.send(request, context).await?;
        let created = created.ok_or_else(|| {
            PlatformError::Posting(format!("X returned no post id during {}", context))
        })?;
        Ok(created.id)
    }
}

#[async_trait]
impl Platform for XClient {
    async fn authenticate(&mut self) -> Result<()> {
        let request = self.http.get(self.url("/2/users/me"));
        let me: Option<User> = self.send(request, "authentication").await?;
        let me = me.ok_or_else(|| {
            PlatformError::Authentication("X did not return the authenticated user".to_string())
        })?;

        debug!("Authenticated with X as @{}", me.username);
        self.user_id = Some(me.id);
        Ok(())
    }

    async fn post(&self, text: &str, media_ids: &[String]) -> Result<String> {
        let body = CreateTweet {
            text,
            media: (!media_ids.is_empty()).then_some(MediaRef { media_ids }),
            reply: None,
        };
        let id = self.create_tweet(&body, "post").await?;
        debug!("Post published: {}", id);
        Ok(id)
    }

    async fn reply(&self, parent_id: &str, text: &str) -> Result<String> {
        let body = CreateTweet {
            text,
            media: None,
            reply: Some(ReplyRef {
                in_reply_to_tweet_id: parent_id,
            }),
        };
        let id = self.create_tweet(&body, "reply").await?;
        debug!("Reply to {} published: {}", parent_id, id);
        Ok(id)
    }

    async fn upload_media(&self, bytes: &[u8]) -> Result<String> {
        let mime = ImageMimeType::sniff(bytes).ok_or_else(|| {
            PlatformError::Validation("Media is not a JPEG, PNG, GIF or WebP image".to_string())
        })?;

        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(format!("image.{}", mime.extension()))
            .mime_str(mime.as_mime_str())
            .map_err(|e| PlatformError::Validation(format!("Invalid media type: {}", e)))?;
        let form = reqwest::multipart::Form::new()
            .text("media_category", "tweet_image")
            .part("media", part);

        let request = self.http.post(self.url("/2/media/upload")).multipart(form);
        let media: Option<IdOnly> = self.send(request, "media upload").await?;
        let media = media.ok_or_else(|| {
            PlatformError::Posting("X returned no media id for the upload".to_string())
        })?;
        Ok(media.id)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Tweet>> {
        let formatted = format!("{} -is:retweet -is:reply", query);
        let max_results = limit.clamp(SEARCH_MIN_RESULTS, SEARCH_MAX_RESULTS);

        let request = self.http.get(self.url("/2/tweets/search/recent")).query(&[
            ("query", formatted),
            ("max_results", max_results.to_string()),
        ]);
        let mut tweets: Vec<Tweet> = self.send(request, "search").await?.unwrap_or_default();
        tweets.truncate(limit);
        Ok(tweets)
    }

    async fn get_mentions(&self, since_id: Option<&str>) -> Result<Vec<Tweet>> {
        let user_id = self.user_id.as_deref().ok_or_else(|| {
            PlatformError::Authentication(
                "Mentions require an authenticated X session".to_string(),
            )
        })?;

        let mut request = self
            .http
            .get(self.url(&format!("/2/users/{}/mentions", user_id)));
        if let Some(since_id) = since_id {
            request = request.query(&[("since_id", since_id)]);
        }
        Ok(self.send(request, "mentions").await?.unwrap_or_default())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Tweet>> {
        let request = self.http.get(self.url(&format!("/2/tweets/{}", id)));
        self.send(request, "lookup").await
    }

    fn name(&self) -> &str {
        "x"
    }

    fn character_limit(&self) -> Option<usize> {
        Some(CHARACTER_LIMIT)
    }
}
