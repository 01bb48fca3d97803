//! Concrete clients for the external services behind each stage.

pub mod elevenlabs;
pub mod huggingface;
#[cfg(feature = "local-tts")]
pub mod kokoro;
pub mod openai;
pub mod wikipedia;

pub use elevenlabs::ElevenLabsClient;
pub use huggingface::{HuggingFaceAudio, HuggingFaceImages};
#[cfg(feature = "local-tts")]
pub use kokoro::KokoroSpeech;
pub use openai::OpenAiCompletion;
pub use wikipedia::WikipediaClient;

use crate::config::NetworkConfig;
use crate::error::{PodcastError, Result};

const USER_AGENT: &str = concat!("podcastai/", env!("CARGO_PKG_VERSION"));

/// HTTP client shared by the providers, with the configured timeouts.
pub fn http_client(network: &NetworkConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(network.request_timeout())
        .connect_timeout(network.connect_timeout())
        .build()
        .map_err(|e| PodcastError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a non-2xx response into a `Provider` error carrying status and body.
pub(crate) async fn check_status(provider: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PodcastError::Provider {
        provider: provider.to_string(),
        status: Some(status.as_u16()),
        message: if body.is_empty() {
            status.to_string()
        } else {
            body
        },
    })
}
