//! Pollinations text-to-image endpoint (no API key)

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Url;
use tracing::debug;

use super::{ImageGenerator, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::ai::openai::map_provider_status;
use crate::error::{ConfigError, ProviderError, Result};
use crate::types::ImageMimeType;

pub const DEFAULT_BASE_URL: &str = "https://image.pollinations.ai";
pub const DEFAULT_MODEL: &str = "flux";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct PollinationsGenerator {
    http: reqwest::Client,
    base_url: Url,
    model: String,
    width: u32,
    height: u32,
}

impl PollinationsGenerator {
    pub fn new(base_url: Option<String>, model: Option<String>) -> Result<Self> {
        let raw = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&raw)
            .map_err(|e| ConfigError::InvalidValue(format!("image.base_url '{}': {}", raw, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue(format!("image.base_url '{}' is not a base URL", raw)).into());
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        })
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Request URL for `prompt` with the given `seed`
    pub fn request_url(&self, prompt: &str, seed: u32) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("prompt").push(prompt);
        }
        url.query_pairs_mut()
            .append_pair("width", &self.width.to_string())
            .append_pair("height", &self.height.to_string())
            .append_pair("seed", &seed.to_string())
            .append_pair("model", &self.model)
            .append_pair("enhance", "true")
            .append_pair("private", "false");
        url
    }
}

#[async_trait]
impl ImageGenerator for PollinationsGenerator {
    fn name(&self) -> &str {
        "pollinations"
    }

    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        let seed = rand::thread_rng().gen_range(1000..=9999);
        let url = self.request_url(prompt, seed);
        debug!("Requesting image (seed {})", seed);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("pollinations request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_provider_status("pollinations", status, &body).into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Network(format!("pollinations body read failed: {}", e)))?;

        if ImageMimeType::sniff(&bytes).is_none() {
            return Err(ProviderError::InvalidResponse(format!(
                "pollinations returned {} bytes that are not a recognized image",
                bytes.len()
            ))
            .into());
        }

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_url_encodes_prompt() {
        let generator = PollinationsGenerator::new(None, None).unwrap();
        let url = generator.request_url("neon server racks / at night?", 4242);

        assert_eq!(url.host_str(), Some("image.pollinations.ai"));
        assert!(url.path().starts_with("/prompt/neon%20server%20racks%20%2F%20at%20night%3F"));

        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("width".into(), "1200".into())));
        assert!(query.contains(&("height".into(), "630".into())));
        assert!(query.contains(&("seed".into(), "4242".into())));
        assert!(query.contains(&("model".into(), "flux".into())));
        assert!(query.contains(&("enhance".into(), "true".into())));
        assert!(query.contains(&("private".into(), "false".into())));
    }

    #[test]
    fn test_custom_size_and_base() {
        let generator = PollinationsGenerator::new(Some("http://localhost:9000".into()), Some("turbo".into()))
            .unwrap()
            .with_size(640, 480);
        let url = generator.request_url("x", 1000);
        assert_eq!(url.path(), "/prompt/x");
        assert!(url.query().unwrap().contains("width=640"));
        assert!(url.query().unwrap().contains("model=turbo"));
    }

    #[test]
    fn test_invalid_base_rejected() {
        assert!(PollinationsGenerator::new(Some("not a url".into()), None).is_err());
    }
}
