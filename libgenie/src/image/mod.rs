//! Image generation for posts
//!
//! [`ImagePipeline`] tries a remote [`ImageGenerator`] first and falls back
//! to a locally synthesized [`PlaceholderImage`].

pub mod placeholder;
pub mod pollinations;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::Result;

pub use placeholder::PlaceholderImage;
pub use pollinations::PollinationsGenerator;

/// Default canvas size, the 1.91:1 card ratio X renders without cropping
pub const DEFAULT_WIDTH: u32 = 1200;
pub const DEFAULT_HEIGHT: u32 = 630;

/// A backend that turns a prompt into encoded image bytes
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<Vec<u8>>;
}

pub struct ImagePipeline {
    remote: Option<Box<dyn ImageGenerator>>,
    placeholder: PlaceholderImage,
}

impl ImagePipeline {
    pub fn new(remote: Option<Box<dyn ImageGenerator>>, placeholder: PlaceholderImage) -> Self {
        Self {
            remote,
            placeholder,
        }
    }

    /// Pipeline that only ever renders placeholders
    pub fn offline(width: u32, height: u32) -> Self {
        Self::new(None, PlaceholderImage::new(width, height))
    }

    /// Image bytes for `prompt`, or a placeholder titled `title`
    ///
    /// `None` only when the placeholder itself could not be encoded.
    pub async fn generate(&self, prompt: &str, title: &str) -> Option<Vec<u8>> {
        if let Some(remote) = &self.remote {
            match remote.generate(prompt).await {
                Ok(bytes) => {
                    info!("Received {} byte image from {}", bytes.len(), remote.name());
                    return Some(bytes);
                }
                Err(e) => warn!("{} image generation failed, using placeholder: {}", remote.name(), e),
            }
        }

        match self.placeholder.render(title) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Placeholder image could not be encoded: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::types::ImageMimeType;

    struct FixedGenerator(Option<Vec<u8>>);

    #[async_trait]
    impl ImageGenerator for FixedGenerator {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _prompt: &str) -> Result<Vec<u8>> {
            self.0
                .clone()
                .ok_or_else(|| ProviderError::Network("offline".into()).into())
        }
    }

    #[tokio::test]
    async fn test_remote_bytes_preferred() {
        let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00];
        let pipeline = ImagePipeline::new(
            Some(Box::new(FixedGenerator(Some(jpeg.clone())))),
            PlaceholderImage::new(64, 32),
        );
        assert_eq!(pipeline.generate("prompt", "title").await, Some(jpeg));
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_to_placeholder() {
        let pipeline = ImagePipeline::new(
            Some(Box::new(FixedGenerator(None))),
            PlaceholderImage::new(64, 32),
        );
        let bytes = pipeline.generate("prompt", "Caching").await.unwrap();
        assert_eq!(ImageMimeType::sniff(&bytes), Some(ImageMimeType::Png));
    }

    #[tokio::test]
    async fn test_offline_pipeline() {
        let bytes = ImagePipeline::offline(32, 32).generate("p", "t").await.unwrap();
        assert_eq!(ImageMimeType::sniff(&bytes), Some(ImageMimeType::Png));
    }
}
