//! ElevenLabs text-to-speech.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::config::{Credentials, NetworkConfig, VoiceFormat, VoicesConfig};
use crate::error::{PodcastError, Result};
use crate::providers::{check_status, http_client};
use crate::speech::{SpeechProvider, VoiceSettings};

pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
const XI_API_KEY_HEADER: &str = "xi-api-key";
const PROVIDER: &str = "ElevenLabs";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_id: Option<&'a str>,
    voice_settings: VoiceSettingsBody,
}

#[derive(Debug, Serialize)]
struct VoiceSettingsBody {
    stability: f32,
    similarity_boost: f32,
}

pub struct ElevenLabsClient {
    inner: reqwest::Client,
    api_key: String,
    base_url: String,
    model_id: Option<String>,
    format: VoiceFormat,
}

impl ElevenLabsClient {
    pub fn new(credentials: &Credentials, voices: &VoicesConfig, network: &NetworkConfig) -> Result<Self> {
        let api_key = Credentials::require(&credentials.elevenlabs_api_key, "ELEVENLABS_API_KEY")?;
        Ok(Self {
            inner: http_client(network)?,
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model_id: voices.model_id.clone(),
            format: voices.format,
        })
    }

    /// Point the client at another host, e.g. a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, voice_id: &str) -> String {
        format!(
            "{}/v1/text-to-speech/{}?output_format={}",
            self.base_url,
            voice_id,
            self.format.output_format()
        )
    }
}

#[async_trait]
impl SpeechProvider for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice_id: &str, settings: &VoiceSettings) -> Result<Vec<u8>> {
        let body = SpeechRequest {
            text,
            model_id: self.model_id.as_deref(),
            voice_settings: VoiceSettingsBody {
                stability: settings.stability,
                similarity_boost: settings.similarity_boost,
            },
        };

        let response = self
            .inner
            .post(self.url(voice_id))
            .header(XI_API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PodcastError::http(PROVIDER, e))?;
        let response = check_status(PROVIDER, response).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PodcastError::http(PROVIDER, e))?;
        if bytes.is_empty() {
            return Err(PodcastError::provider(PROVIDER, "empty audio response"));
        }
        debug!(voice_id, bytes = bytes.len(), "speech clip received");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            elevenlabs_api_key: Some("xi-test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_url_carries_voice_and_format() {
        let client = ElevenLabsClient::new(&credentials(), &VoicesConfig::default(), &NetworkConfig::default())
            .unwrap()
            .with_base_url("http://localhost:9000/");
        assert_eq!(
            client.url("bVMeCyTHy58xNoL34h3p"),
            "http://localhost:9000/v1/text-to-speech/bVMeCyTHy58xNoL34h3p?output_format=mp3_44100_128"
        );
    }

    #[test]
    fn test_pcm_format_in_url() {
        let voices = VoicesConfig {
            format: VoiceFormat::Pcm { sample_rate: 24000 },
            ..VoicesConfig::default()
        };
        let client = ElevenLabsClient::new(&credentials(), &voices, &NetworkConfig::default()).unwrap();
        assert!(client.url("v").ends_with("output_format=pcm_24000"));
    }

    #[test]
    fn test_request_body_shape() {
        let body = SpeechRequest {
            text: "Hey Anna!",
            model_id: None,
            voice_settings: VoiceSettingsBody {
                stability: 0.0,
                similarity_boost: 0.0,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["text"], "Hey Anna!");
        assert!(value.get("model_id").is_none());
        assert_eq!(value["voice_settings"]["stability"], 0.0);
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let result = ElevenLabsClient::new(&Credentials::default(), &VoicesConfig::default(), &NetworkConfig::default());
        assert!(matches!(result, Err(PodcastError::ConfigError(_))));
    }
}
