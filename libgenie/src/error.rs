//! Error types for Genie

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenieError>;

#[derive(Error, Debug)]
pub enum GenieError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GenieError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            GenieError::InvalidInput(_) => 3,
            GenieError::Platform(PlatformError::Authentication(_)) => 2,
            GenieError::Provider(ProviderError::Authentication(_)) => 2,
            GenieError::Platform(_) => 1,
            GenieError::Provider(_) => 1,
            GenieError::Config(_) => 1,
            GenieError::Ledger(_) => 1,
        }
    }

    /// Whether this error is a throttling signal (HTTP 429 or equivalent)
    ///
    /// Throttling is never retried in place. Platform callers arm the
    /// lockout guard instead, and the AI router moves on to its fallback.
    pub fn is_throttled(&self) -> bool {
        matches!(
            self,
            GenieError::Platform(PlatformError::RateLimit(_))
                | GenieError::Provider(ProviderError::RateLimited(_))
        )
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed ledger data: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("Provider authentication failed: {0}")]
    Authentication(String),

    #[error("Provider rate limited: {0}")]
    RateLimited(String),

    #[error("Provider request failed: {0}")]
    Request(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Provider network error: {0}")]
    Network(String),

    #[error("Unsupported provider: {0}")]
    Unsupported(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = GenieError::InvalidInput("Unknown task".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_errors() {
        let platform = GenieError::Platform(PlatformError::Authentication("bad token".into()));
        let provider = GenieError::Provider(ProviderError::Authentication("bad key".into()));
        assert_eq!(platform.exit_code(), 2);
        assert_eq!(provider.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_errors() {
        let posting = GenieError::Platform(PlatformError::Posting("boom".into()));
        let config = GenieError::Config(ConfigError::MissingField("x.access_token".into()));
        let ledger = GenieError::Ledger(LedgerError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )));
        assert_eq!(posting.exit_code(), 1);
        assert_eq!(config.exit_code(), 1);
        assert_eq!(ledger.exit_code(), 1);
    }

    #[test]
    fn test_throttling_detection() {
        assert!(GenieError::from(PlatformError::RateLimit("429".into())).is_throttled());
        assert!(GenieError::from(ProviderError::RateLimited("429".into())).is_throttled());
        assert!(!GenieError::from(PlatformError::Network("reset".into())).is_throttled());
        assert!(!GenieError::from(ProviderError::Request("500".into())).is_throttled());
    }

    #[test]
    fn test_error_message_formatting() {
        let error = GenieError::Platform(PlatformError::RateLimit("Too Many Requests".into()));
        assert_eq!(
            error.to_string(),
            "Platform error: Rate limit exceeded: Too Many Requests"
        );

        let error = GenieError::Config(ConfigError::MissingField("ai.api_key".into()));
        assert_eq!(
            error.to_string(),
            "Configuration error: Missing required field: ai.api_key"
        );
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Network("Connection reset".to_string());
        let cloned = original.clone();
        assert_eq!(original.to_string(), cloned.to_string());
    }
}
