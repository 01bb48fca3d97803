//! Cover art: a two-stage diffusion render saved next to the episode.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::audio::codec;
use crate::config::CoverConfig;
use crate::error::{PodcastError, Result};

/// Parameters for one cover render.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub seed: u64,
    pub inference_steps: u32,
    /// Where the base model hands over to the refiner, in [0, 1].
    pub high_noise_frac: f32,
}

impl ImageRequest {
    pub fn for_topic(config: &CoverConfig, topic: &str) -> Self {
        Self {
            prompt: config.prompt_for(topic),
            negative_prompt: config.negative_prompt.clone(),
            seed: config.seed,
            inference_steps: config.inference_steps,
            high_noise_frac: config.high_noise_frac,
        }
    }
}

/// Base plus refiner text-to-image pipeline. Same request and seed, same image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Encoded image bytes (JPEG or PNG).
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>>;
}

/// Render the cover for `topic` and write it to `path`.
pub async fn generate_cover(
    generator: &dyn ImageGenerator,
    config: &CoverConfig,
    topic: &str,
    path: &Path,
) -> Result<usize> {
    let request = ImageRequest::for_topic(config, topic);
    info!(seed = request.seed, steps = request.inference_steps, "rendering cover");

    let image = generator.generate(&request).await?;
    if image.is_empty() {
        return Err(PodcastError::provider("image generator", "returned an empty image"));
    }

    codec::write_atomic(path, &image)?;
    info!(path = %path.display(), bytes = image.len(), "cover written");
    Ok(image.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingImages {
        requests: Mutex<Vec<ImageRequest>>,
    }

    #[async_trait]
    impl ImageGenerator for RecordingImages {
        async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
        }
    }

    #[test]
    fn test_request_fills_topic() {
        let request = ImageRequest::for_topic(&CoverConfig::default(), "Robin");
        assert!(request.prompt.contains("Robin"));
        assert!(!request.prompt.contains("{topic}"));
        assert_eq!(request.seed, 42);
        assert_eq!(request.inference_steps, 40);
    }

    #[tokio::test]
    async fn test_cover_written_to_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("covers").join("robin.jpg");
        let images = RecordingImages::default();

        let written = generate_cover(&images, &CoverConfig::default(), "Robin", &path)
            .await
            .unwrap();

        assert_eq!(written, 4);
        assert_eq!(std::fs::read(&path).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
        assert_eq!(images.requests.lock().unwrap().len(), 1);
    }
}
