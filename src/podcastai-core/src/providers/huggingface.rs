//! Hugging Face Inference API: text-to-audio and the two-stage cover render.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::ambient::AudioGenerator;
use crate::audio::{AudioBuffer, codec};
use crate::config::{Credentials, NetworkConfig};
use crate::cover::{ImageGenerator, ImageRequest};
use crate::error::{PodcastError, Result};
use crate::providers::{check_status, http_client};

pub const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/hf-inference/models";
const PROVIDER: &str = "HuggingFace";
/// MusicGen and AudioGen emit about 50 tokens per second of audio.
const TOKENS_PER_SECOND: u32 = 50;

/// Connection to the inference endpoint. The token is checked on first use.
#[derive(Clone)]
struct InferenceClient {
    inner: reqwest::Client,
    token: Option<String>,
    base_url: String,
}

impl InferenceClient {
    fn new(credentials: &Credentials, network: &NetworkConfig) -> Result<Self> {
        Ok(Self {
            inner: http_client(network)?,
            token: credentials.huggingface_token.clone(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/{}", self.base_url, model)
    }

    /// POST a JSON payload and return the raw body with its content type.
    async fn infer(&self, model: &str, payload: &Value) -> Result<(Vec<u8>, Option<String>)> {
        let token = Credentials::require(&self.token, "HF_TOKEN")?;
        let response = self
            .inner
            .post(self.model_url(model))
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .map_err(|e| PodcastError::http(PROVIDER, e))?;
        let response = check_status(PROVIDER, response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PodcastError::http(PROVIDER, e))?;

        if bytes.is_empty() {
            return Err(PodcastError::provider(PROVIDER, format!("{} returned an empty body", model)));
        }
        debug!(model, bytes = bytes.len(), content_type = ?content_type, "inference response");
        Ok((bytes.to_vec(), content_type))
    }
}

/// Text-to-music or text-to-effect model such as MusicGen or AudioGen.
///
/// Builds without `HF_TOKEN`, so runs whose intro beds are already on disk
/// need no token. Generating without one is a `ConfigError`.
pub struct HuggingFaceAudio {
    client: InferenceClient,
    model: String,
    top_k: u32,
}

impl HuggingFaceAudio {
    pub fn new(
        credentials: &Credentials,
        network: &NetworkConfig,
        model: impl Into<String>,
        top_k: u32,
    ) -> Result<Self> {
        Ok(Self {
            client: InferenceClient::new(credentials, network)?,
            model: model.into(),
            top_k,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn payload(&self, prompt: &str, duration_secs: u32) -> Value {
        json!({
            "inputs": prompt,
            "parameters": {
                "do_sample": true,
                "top_k": self.top_k,
                "max_new_tokens": duration_secs * TOKENS_PER_SECOND,
            }
        })
    }
}

#[async_trait]
impl AudioGenerator for HuggingFaceAudio {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompts: &[String], duration_secs: u32) -> Result<Vec<AudioBuffer>> {
        let mut outputs = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let (bytes, content_type) = self
                .client
                .infer(&self.model, &self.payload(prompt, duration_secs))
                .await?;
            let audio = codec::decode_bytes(bytes, content_type.as_deref())?;
            info!(
                model = %self.model,
                duration_ms = audio.duration_ms(),
                "generated audio"
            );
            outputs.push(audio);
        }
        Ok(outputs)
    }
}

/// Base text-to-image model followed by an image-to-image refiner pass.
pub struct HuggingFaceImages {
    client: InferenceClient,
    base_model: String,
    refiner_model: String,
}

impl HuggingFaceImages {
    pub fn new(
        credentials: &Credentials,
        network: &NetworkConfig,
        base_model: impl Into<String>,
        refiner_model: impl Into<String>,
    ) -> Result<Self> {
        Credentials::require(&credentials.huggingface_token, "HF_TOKEN")?;
        Ok(Self {
            client: InferenceClient::new(credentials, network)?,
            base_model: base_model.into(),
            refiner_model: refiner_model.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn base_payload(request: &ImageRequest) -> Value {
        json!({
            "inputs": request.prompt,
            "parameters": {
                "negative_prompt": request.negative_prompt,
                "seed": request.seed,
                "num_inference_steps": request.inference_steps,
                "denoising_end": request.high_noise_frac,
            }
        })
    }

    fn refiner_payload(request: &ImageRequest, image: &[u8]) -> Value {
        json!({
            "inputs": BASE64.encode(image),
            "parameters": {
                "prompt": request.prompt,
                "negative_prompt": request.negative_prompt,
                "seed": request.seed,
                "num_inference_steps": request.inference_steps,
                "denoising_start": request.high_noise_frac,
            }
        })
    }
}

#[async_trait]
impl ImageGenerator for HuggingFaceImages {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>> {
        let (base_image, _) = self
            .client
            .infer(&self.base_model, &Self::base_payload(request))
            .await?;
        let (refined, _) = self
            .client
            .infer(&self.refiner_model, &Self::refiner_payload(request, &base_image))
            .await?;
        Ok(refined)
    }
}
