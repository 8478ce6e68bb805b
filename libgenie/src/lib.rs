//! Genie - a quota-aware posting agent for X
//!
//! This library holds everything the `genie-bot` binary needs: admission
//! control over the platform's posting quotas, a retry envelope for
//! publishes, AI text generation with provider failover, image generation
//! and the bot tasks that tie them together.

pub mod ai;
pub mod bot;
pub mod clock;
pub mod config;
pub mod error;
pub mod image;
pub mod logging;
pub mod platforms;
pub mod prompts;
pub mod rate_limiter;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use ai::{AiService, ProviderConfig};
pub use bot::{BotSettings, GenieBot};
pub use config::Config;
pub use error::{GenieError, Result};
pub use rate_limiter::{QuotaDecision, QuotaLimits, RateLimiter};
pub use retry::{RetryOutcome, RetryPolicy};
pub use types::{PostEvent, Tweet};
