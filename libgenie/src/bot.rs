//! Bot orchestration
//!
//! [`GenieBot`] wires the publish transport, the AI router, the image
//! pipeline and the rate limiter into the three scheduled tasks. Every
//! publish goes through admission, then the retry envelope, then the
//! ledger. A throttled platform call of any kind, reads included, arms the
//! lockout and ends the task.

use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::ai::AiService;
use crate::config::Config;
use crate::error::{GenieError, Result};
use crate::image::{ImageGenerator, ImagePipeline, PlaceholderImage, PollinationsGenerator};
use crate::platforms::x::XClient;
use crate::platforms::Platform;
use crate::prompts::{self, KEYWORDS};
use crate::rate_limiter::{DecisionReason, RateLimiter};
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::types::{newer_id, Tweet};

/// Behavior knobs for [`GenieBot`]
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub link_suffix: String,
    pub max_post_chars: usize,
    pub keyword_results: usize,
    pub with_image: bool,
    pub brand: String,
    pub warn_threshold: u32,
    pub lockout_hours: u32,
}

impl BotSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            link_suffix: config.bot.link_suffix.clone(),
            max_post_chars: config.bot.max_post_chars,
            keyword_results: config.bot.keyword_results,
            with_image: config.bot.with_image,
            brand: config.bot.brand.clone(),
            warn_threshold: config.limits.warn_threshold,
            lockout_hours: config.limits.lockout_hours,
        }
    }
}

impl Default for BotSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of a single publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishResult {
    Published(String),
    /// Admission refused the publish; nothing was sent
    Denied,
    /// The platform throttled us and the lockout is now armed
    Throttled,
    /// Every attempt failed
    Failed,
}

impl PublishResult {
    pub fn id(&self) -> Option<&str> {
        match self {
            PublishResult::Published(id) => Some(id),
            _ => None,
        }
    }

    /// Whether further publishes in this run are pointless
    fn blocks_further_publishing(&self) -> bool {
        matches!(self, PublishResult::Denied | PublishResult::Throttled)
    }
}

#[derive(Debug, Clone, Copy)]
enum PublishTarget<'a> {
    Post { media_ids: &'a [String] },
    Reply { parent_id: &'a str },
}

enum Lookup {
    Found(Tweet),
    Missing,
    Throttled,
}

enum MediaAttachment {
    Attached(String),
    TextOnly,
    Throttled,
}

pub struct GenieBot {
    platform: Box<dyn Platform>,
    ai: AiService,
    images: ImagePipeline,
    limiter: RateLimiter,
    retry: RetryPolicy,
    settings: BotSettings,
    last_mention_id: Option<String>,
}

impl GenieBot {
    pub fn new(
        platform: Box<dyn Platform>,
        ai: AiService,
        images: ImagePipeline,
        limiter: RateLimiter,
        settings: BotSettings,
    ) -> Self {
        Self {
            platform,
            ai,
            images,
            limiter,
            retry: RetryPolicy::default(),
            settings,
            last_mention_id: None,
        }
    }

    /// Build the production bot: X transport, configured AI providers,
    /// Pollinations images and the on-disk ledger
    pub fn from_config(config: &Config) -> Result<Self> {
        let platform = XClient::new(config.x_access_token()?, config.x.base_url.clone())?;
        let ai = AiService::from_config(&config.provider_config()?)?.with_retry(config.provider_retry());

        let remote: Option<Box<dyn ImageGenerator>> = if config.image.enabled {
            let generator = PollinationsGenerator::new(config.image.base_url.clone(), config.image.model.clone())?
                .with_size(config.image.width, config.image.height);
            Some(Box::new(generator))
        } else {
            None
        };
        let images = ImagePipeline::new(
            remote,
            PlaceholderImage::new(config.image.width, config.image.height),
        );

        let ledger_path = config.ledger_path()?;
        debug!("Using usage ledger at {}", ledger_path.display());
        let limiter = RateLimiter::open(ledger_path, config.quota_limits());

        Ok(Self::new(
            Box::new(platform),
            ai,
            images,
            limiter,
            BotSettings::from_config(config),
        )
        .with_retry(config.publish_retry()))
    }

    /// Retry policy for posts, replies and media uploads
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Resume mention polling after `id`
    pub fn with_last_mention_id(mut self, id: Option<String>) -> Self {
        self.last_mention_id = id;
        self
    }

    /// Authenticate with the platform; returns whether mentions can be read
    ///
    /// Failure is not fatal. Posting and keyword replies do not need the
    /// account identity, so only mention tracking is lost.
    pub async fn connect(&mut self) -> bool {
        let result = self.platform.authenticate().await;
        match result {
            Ok(()) => true,
            Err(e) => {
                if !self.throttled_read("Authentication", &e) {
                    warn!("Authentication failed, mention tracking disabled: {}", e);
                }
                false
            }
        }
    }

    pub fn rate_limiter(&mut self) -> &mut RateLimiter {
        &mut self.limiter
    }

    pub fn last_mention_id(&self) -> Option<&str> {
        self.last_mention_id.as_deref()
    }

    /// Generate and publish an original post, with an image when enabled
    pub async fn run_post_task(&mut self) -> Option<String> {
        if !self.admit() {
            return None;
        }

        let keyword = random_keyword();
        info!("Generating post from keyword '{}'", keyword);

        let topic = self
            .ai
            .generate_response(&prompts::topic_prompt(keyword), None)
            .await
            .map(|t| prompts::clean_topic(&t))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| keyword.to_string());
        info!("Selected topic: {}", topic);

        let Some(body) = self.ai.generate_response(&prompts::post_prompt(&topic), None).await else {
            warn!("No post text generated for '{}', skipping", topic);
            return None;
        };
        let text = prompts::compose_post_text(&body, &self.settings.link_suffix, self.settings.max_post_chars);
        debug!("Final post ({} chars): {}", text.chars().count(), text);

        let media_ids = if self.settings.with_image {
            match self.attach_image(&topic, &body).await {
                MediaAttachment::Attached(id) => vec![id],
                MediaAttachment::TextOnly => Vec::new(),
                MediaAttachment::Throttled => return None,
            }
        } else {
            Vec::new()
        };

        self.publish(&text, PublishTarget::Post { media_ids: &media_ids })
            .await
            .id()
            .map(str::to_string)
    }

    /// Reply to one random post found through a keyword search
    pub async fn run_keyword_task(&mut self) -> Option<String> {
        if !self.admit() {
            return None;
        }

        let keyword = random_keyword();
        info!("Searching recent posts for '{}'", keyword);

        let search = self.platform.search(keyword, self.settings.keyword_results).await;
        let results = match search {
            Ok(results) => results,
            Err(e) if self.throttled_read("Search", &e) => return None,
            Err(e) => {
                warn!("Search for '{}' failed: {}", keyword, e);
                Vec::new()
            }
        };
        let Some(candidate) = results.choose(&mut rand::thread_rng()).cloned() else {
            info!("No posts found for '{}'", keyword);
            return None;
        };

        let Lookup::Found(original) = self.fetch(&candidate.id).await else {
            return None;
        };
        let prompt = prompts::keyword_reply_prompt(&self.settings.brand, &original.text);
        let Some(response) = self.ai.generate_response(&prompt, Some(&candidate.id)).await else {
            warn!("No reply generated for post {}", candidate.id);
            return None;
        };

        let text = self.fit_reply(&response);
        let result = self
            .publish(&text, PublishTarget::Reply { parent_id: &candidate.id })
            .await;
        if result.id().is_some() {
            info!("Replied to post {}", candidate.id);
        }
        result.id().map(str::to_string)
    }

    /// Reply to new mentions; returns how many replies were published
    ///
    /// Stops early once admission refuses a publish or the platform
    /// throttles us.
    pub async fn run_mentions_task(&mut self) -> usize {
        if !self.admit() {
            return 0;
        }

        let since = self.last_mention_id.clone();
        info!("Checking mentions since {}", since.as_deref().unwrap_or("the beginning"));

        let query = self.platform.get_mentions(since.as_deref()).await;
        let mentions = match query {
            Ok(mentions) => mentions,
            Err(e) if self.throttled_read("Mentions query", &e) => return 0,
            Err(e) => {
                warn!("Fetching mentions failed: {}", e);
                Vec::new()
            }
        };

        let mut replied = 0;
        for mention in mentions {
            let newest = match &self.last_mention_id {
                Some(current) => newer_id(current, &mention.id).to_string(),
                None => mention.id.clone(),
            };
            self.last_mention_id = Some(newest);

            let tweet = match self.fetch(&mention.id).await {
                Lookup::Found(tweet) => tweet,
                Lookup::Missing => continue,
                Lookup::Throttled => break,
            };
            let prompt = prompts::mention_reply_prompt(&self.settings.brand, &tweet.text);
            let Some(response) = self.ai.generate_response(&prompt, Some(&mention.id)).await else {
                warn!("No reply generated for mention {}", mention.id);
                continue;
            };

            let text = self.fit_reply(&response);
            let result = self
                .publish(&text, PublishTarget::Reply { parent_id: &mention.id })
                .await;
            match result {
                PublishResult::Published(_) => {
                    info!("Responded to mention {}", mention.id);
                    replied += 1;
                }
                ref r if r.blocks_further_publishing() => break,
                _ => {}
            }
        }

        replied
    }

    /// Authenticate, then post, keyword reply and mentions, in that order
    ///
    /// The mentions task is skipped when authentication failed.
    pub async fn run_all(&mut self) {
        let connected = self.connect().await;
        self.run_post_task().await;
        self.run_keyword_task().await;
        if connected {
            self.run_mentions_task().await;
        } else {
            info!("Skipping mentions: not authenticated");
        }
    }

    fn admit(&mut self) -> bool {
        let decision = self.limiter.can_post(self.settings.warn_threshold);
        match decision.reason {
            _ if !decision.allowed => warn!("{}", decision.message),
            DecisionReason::NearMonthlyLimit => warn!("{}", decision.message),
            _ => debug!("{}", decision.message),
        }
        decision.allowed
    }

    async fn fetch(&mut self, id: &str) -> Lookup {
        let result = self.platform.get_by_id(id).await;
        match result {
            Ok(Some(tweet)) => Lookup::Found(tweet),
            Ok(None) => {
                info!("Post {} no longer exists", id);
                Lookup::Missing
            }
            Err(e) if self.throttled_read("Lookup", &e) => Lookup::Throttled,
            Err(e) => {
                warn!("Could not fetch post {}: {}", id, e);
                Lookup::Missing
            }
        }
    }

    /// Arm the lockout if `error` is a throttling signal
    fn throttled_read(&mut self, what: &str, error: &GenieError) -> bool {
        if !error.is_throttled() {
            return false;
        }
        let until = self.limiter.set_lockout(self.settings.lockout_hours);
        warn!("{} throttled by {}; publishing paused until {}", what, self.platform.name(), until);
        true
    }

    fn fit_reply(&self, text: &str) -> String {
        let limit = self
            .platform
            .character_limit()
            .unwrap_or(self.settings.max_post_chars);
        prompts::compose_post_text(text, "", limit)
    }

    async fn attach_image(&mut self, topic: &str, post_text: &str) -> MediaAttachment {
        let Some(image_prompt) = self.ai.generate_image_prompt(topic, Some(post_text)).await else {
            info!("Image prompt generation failed, posting text only");
            return MediaAttachment::TextOnly;
        };
        let Some(bytes) = self.images.generate(&image_prompt, topic).await else {
            info!("No image available, posting text only");
            return MediaAttachment::TextOnly;
        };

        let platform = self.platform.as_ref();
        let bytes = bytes.as_slice();
        let outcome = self
            .retry
            .run("media upload", || async { platform.upload_media(bytes).await })
            .await;

        match outcome {
            RetryOutcome::Succeeded(media_id) => MediaAttachment::Attached(media_id),
            RetryOutcome::Throttled(_) => {
                let until = self.limiter.set_lockout(self.settings.lockout_hours);
                warn!("Media upload throttled; publishing paused until {}", until);
                MediaAttachment::Throttled
            }
            RetryOutcome::Exhausted(_) => {
                info!("Media upload failed, posting text only");
                MediaAttachment::TextOnly
            }
        }
    }

    async fn publish(&mut self, text: &str, target: PublishTarget<'_>) -> PublishResult {
        if !self.admit() {
            return PublishResult::Denied;
        }

        let platform = self.platform.as_ref();
        let label = match target {
            PublishTarget::Post { .. } => "post",
            PublishTarget::Reply { .. } => "reply",
        };
        let outcome = self
            .retry
            .run(label, || async {
                match target {
                    PublishTarget::Post { media_ids } => platform.post(text, media_ids).await,
                    PublishTarget::Reply { parent_id } => platform.reply(parent_id, text).await,
                }
            })
            .await;

        match outcome {
            RetryOutcome::Succeeded(id) => {
                info!("Published {} {}", label, id);
                self.limiter.record_post(&id);
                PublishResult::Published(id)
            }
            RetryOutcome::Throttled(_) => {
                let until = self.limiter.set_lockout(self.settings.lockout_hours);
                warn!(
                    "{} throttled by {}; publishing paused until {}",
                    label,
                    platform.name(),
                    until
                );
                PublishResult::Throttled
            }
            RetryOutcome::Exhausted(_) => PublishResult::Failed,
        }
    }
}

fn random_keyword() -> &'static str {
    KEYWORDS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Software Engineer")
}
