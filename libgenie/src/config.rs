//! Configuration management for Genie
//!
//! Settings come from a TOML file, with secrets and the ledger location
//! overridable from the environment. Every section is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai::{ProviderConfig, ProviderKind};
use crate::error::{ConfigError, Result};
use crate::rate_limiter::QuotaLimits;
use crate::retry::RetryPolicy;

pub const CONFIG_ENV: &str = "GENIE_CONFIG";
pub const X_ACCESS_TOKEN_ENV: &str = "GENIE_X_ACCESS_TOKEN";
pub const AI_API_KEY_ENV: &str = "GENIE_AI_API_KEY";
pub const AI_FALLBACK_API_KEY_ENV: &str = "GENIE_AI_FALLBACK_API_KEY";
pub const LEDGER_PATH_ENV: &str = "GENIE_LEDGER_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub limits: LimitsConfig,
    pub retry: RetryConfig,
    pub x: XConfig,
    pub ai: AiConfig,
    pub image: ImageConfig,
    pub bot: BotConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Usage file; defaults to `<data_dir>/genie/usage.json`
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub monthly: u32,
    pub daily: u32,
    /// Remaining monthly posts at or below which a warning is emitted
    pub warn_threshold: u32,
    /// How long a throttling response blocks publishing
    pub lockout_hours: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let quota = QuotaLimits::default();
        Self {
            monthly: quota.monthly,
            daily: quota.daily,
            warn_threshold: 50,
            lockout_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct XConfig {
    /// OAuth 2.0 user-context token
    pub access_token: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: String,
    pub api_key: Option<String>,
    /// Defaults to the provider's standard model
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub fallback_provider: Option<String>,
    pub fallback_api_key: Option<String>,
    pub fallback_model: Option<String>,
    /// Attempts per provider before failing over
    pub retry_attempts: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Groq.as_str().to_string(),
            api_key: None,
            model: None,
            base_url: None,
            fallback_provider: None,
            fallback_api_key: None,
            fallback_model: None,
            retry_attempts: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Use the remote generator; placeholders are always available
    pub enabled: bool,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub width: u32,
    pub height: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            model: None,
            width: crate::image::DEFAULT_WIDTH,
            height: crate::image::DEFAULT_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Appended to every scheduled post
    pub link_suffix: String,
    pub max_post_chars: usize,
    /// Search results fetched per keyword run
    pub keyword_results: usize,
    /// Attach an image to scheduled posts
    pub with_image: bool,
    /// Persona name used in reply prompts
    pub brand: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            link_suffix: "\n\nLearn more at interviewgenie.net".to_string(),
            max_post_chars: 260,
            keyword_results: 5,
            with_image: true,
            brand: "AskMeGenie".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `GENIE_CONFIG` or the default location
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Load configuration, preferring an explicit `path`
    ///
    /// An explicit path (argument or `GENIE_CONFIG`) must exist. A missing
    /// file at the default location yields the defaults.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        let (config_path, required) = match path {
            Some(p) => (expand_path(&p.to_string_lossy()), true),
            None => match std::env::var(CONFIG_ENV) {
                Ok(p) if !p.trim().is_empty() => (expand_path(&p), true),
                _ => (resolve_config_path()?, false),
            },
        };

        let mut config = if required || config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a specific file without environment overrides
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply non-empty `GENIE_*` environment variables over file values
    pub fn apply_env_overrides(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(token) = var(X_ACCESS_TOKEN_ENV) {
            self.x.access_token = Some(token);
        }
        if let Some(key) = var(AI_API_KEY_ENV) {
            self.ai.api_key = Some(key);
        }
        if let Some(key) = var(AI_FALLBACK_API_KEY_ENV) {
            self.ai.fallback_api_key = Some(key);
        }
        if let Some(path) = var(LEDGER_PATH_ENV) {
            self.ledger.path = Some(path);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.ai.provider.parse::<ProviderKind>()?;
        if let Some(fallback) = &self.ai.fallback_provider {
            fallback.parse::<ProviderKind>()?;
        }
        if self.limits.monthly == 0 || self.limits.daily == 0 {
            return Err(ConfigError::InvalidValue(
                "limits.monthly and limits.daily must be greater than zero".to_string(),
            )
            .into());
        }
        if self.bot.max_post_chars <= self.bot.link_suffix.chars().count() + 3 {
            return Err(ConfigError::InvalidValue(format!(
                "bot.max_post_chars ({}) leaves no room for post text after the link suffix",
                self.bot.max_post_chars
            ))
            .into());
        }
        if self.image.width == 0 || self.image.height == 0 {
            return Err(ConfigError::InvalidValue(
                "image.width and image.height must be greater than zero".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Location of the usage ledger file
    pub fn ledger_path(&self) -> Result<PathBuf> {
        match &self.ledger.path {
            Some(path) => Ok(expand_path(path)),
            None => Ok(resolve_data_path()?.join("usage.json")),
        }
    }

    pub fn quota_limits(&self) -> QuotaLimits {
        QuotaLimits {
            monthly: self.limits.monthly,
            daily: self.limits.daily,
        }
    }

    /// Retry policy for publish calls
    pub fn publish_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_secs(self.retry.retry_delay_secs),
        )
    }

    /// Retry policy for each AI provider call
    pub fn provider_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.ai.retry_attempts, Duration::from_secs(self.retry.retry_delay_secs))
    }

    pub fn x_access_token(&self) -> Result<String> {
        self.x
            .access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::MissingField(format!("x.access_token (or {})", X_ACCESS_TOKEN_ENV))
                    .into()
            })
    }

    /// Provider settings for the AI router
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        let kind: ProviderKind = self.ai.provider.parse()?;
        let api_key = self
            .ai
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::MissingField(format!("ai.api_key (or {})", AI_API_KEY_ENV))
            })?;
        let model = self
            .ai
            .model
            .clone()
            .unwrap_or_else(|| kind.default_model().to_string());

        Ok(ProviderConfig {
            provider_name: kind.as_str().to_string(),
            api_key,
            model_name: model,
            base_url: self.ai.base_url.clone(),
            fallback_provider_name: self.ai.fallback_provider.clone(),
            fallback_api_key: self.ai.fallback_api_key.clone(),
            fallback_model_name: self.ai.fallback_model.clone(),
            fallback_base_url: None,
        })
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// Default configuration file, `<config_dir>/genie/config.toml`
pub fn resolve_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("genie").join("config.toml"))
}

/// Data directory, `<data_dir>/genie`
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("genie"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        CONFIG_ENV,
        X_ACCESS_TOKEN_ENV,
        AI_API_KEY_ENV,
        AI_FALLBACK_API_KEY_ENV,
        LEDGER_PATH_ENV,
    ];

    fn clear_env() {
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
    }

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.limits.monthly, 500);
        assert_eq!(config.limits.daily, 17);
        assert_eq!(config.limits.warn_threshold, 50);
        assert_eq!(config.limits.lockout_hours, 24);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.publish_retry().retry_delay, Duration::from_secs(10));
        assert_eq!(config.ai.provider, "groq");
        assert_eq!(config.bot.max_post_chars, 260);
        assert_eq!(config.bot.keyword_results, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[limits]
daily = 10

[ai]
provider = "gemini"
api_key = "g-key"
"#,
        );

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.limits.daily, 10);
        assert_eq!(config.limits.monthly, 500);
        assert_eq!(config.retry.max_retries, 3);

        let provider = config.provider_config().unwrap();
        assert_eq!(provider.provider_name, "gemini");
        assert_eq!(provider.model_name, "gemini-2.5-flash");
        assert!(!provider.has_fallback());
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[limits\nmonthly = ");
        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    #[serial]
    fn test_explicit_missing_file_is_error() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::load_with(Some(&missing)).is_err());

        std::env::set_var(CONFIG_ENV, &missing);
        assert!(Config::load().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[x]
access_token = "from-file"

[ai]
api_key = "file-key"
"#,
        );
        std::env::set_var(CONFIG_ENV, &path);
        std::env::set_var(X_ACCESS_TOKEN_ENV, "from-env");
        std::env::set_var(AI_FALLBACK_API_KEY_ENV, "fallback-env");
        std::env::set_var(LEDGER_PATH_ENV, "/tmp/genie-ledger.json");

        let config = Config::load().unwrap();
        assert_eq!(config.x_access_token().unwrap(), "from-env");
        assert_eq!(config.ai.api_key.as_deref(), Some("file-key"));
        assert_eq!(
            config.ledger_path().unwrap(),
            PathBuf::from("/tmp/genie-ledger.json")
        );
        assert!(config.provider_config().unwrap().has_fallback());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_empty_env_values_ignored() {
        clear_env();
        std::env::set_var(AI_API_KEY_ENV, "  ");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert!(config.ai.api_key.is_none());
        clear_env();
    }

    #[test]
    fn test_missing_secrets_are_config_errors() {
        let config = Config::default();
        let err = config.x_access_token().unwrap_err();
        assert!(err.to_string().contains("x.access_token"));
        assert_eq!(err.exit_code(), 1);
        assert!(config.provider_config().is_err());
    }

    #[test]
    fn test_unknown_provider_fails_validation() {
        let mut config = Config::default();
        config.ai.provider = "skynet".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_limits_fail_validation() {
        let mut config = Config::default();
        config.limits.daily = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tilde_ledger_path_expanded() {
        let mut config = Config::default();
        config.ledger.path = Some("~/genie/usage.json".to_string());
        let path = config.ledger_path().unwrap();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("genie/usage.json"));
    }

    #[test]
    fn test_default_ledger_under_data_dir() {
        let config = Config::default();
        if let Ok(path) = config.ledger_path() {
            assert!(path.ends_with("genie/usage.json"));
        }
    }
}
