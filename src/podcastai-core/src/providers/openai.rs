//! OpenAI-compatible chat completions.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs, ResponseFormat,
    ResponseFormatJsonSchema,
};
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use serde_json::Value;
use tracing::debug;

use crate::completion::{CompletionService, ResponseShape, parse_json_object, sanitize_response};
use crate::config::{Credentials, NetworkConfig};
use crate::error::{PodcastError, Result};
use crate::providers::http_client;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

const PROVIDER: &str = "OpenAI";

/// Chat completion client. Each call is sent exactly once.
pub struct OpenAiCompletion {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCompletion {
    pub fn new(credentials: &Credentials, model: impl Into<String>, network: &NetworkConfig) -> Result<Self> {
        let api_key = Credentials::require(&credentials.openai_api_key, "OPENAI_API_KEY")?;
        let api_base = credentials
            .openai_api_base
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(DEFAULT_API_BASE);

        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        // The client retries 429 and 5xx responses by default; one attempt only.
        let no_retry = ExponentialBackoff {
            max_elapsed_time: Some(Duration::ZERO),
            ..Default::default()
        };
        let client = Client::with_config(config)
            .with_http_client(http_client(network)?)
            .with_backoff(no_retry);

        Ok(Self {
            client,
            model: model.into(),
        })
    }

    fn messages(system: &str, user: &str) -> Vec<ChatCompletionRequestMessage> {
        vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: system.to_string().into(),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: user.to_string().into(),
                name: None,
            }),
        ]
    }

    async fn send(&self, args: &mut CreateChatCompletionRequestArgs) -> Result<String> {
        let request = args.build()?;
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(from_openai)?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| PodcastError::provider(PROVIDER, "response has no choices"))?;
        let content = choice.message.content.clone().unwrap_or_default();
        debug!(model = %self.model, chars = content.len(), "completion received");
        Ok(content)
    }
}

/// Keep transport timeouts distinct from other API failures.
fn from_openai(err: OpenAIError) -> PodcastError {
    match err {
        OpenAIError::Reqwest(e) => PodcastError::http(PROVIDER, e),
        other => PodcastError::OpenAIError(other),
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .temperature(temperature)
            .messages(Self::messages(system, user));

        let content = self.send(&mut args).await?;
        Ok(sanitize_response(&content))
    }

    async fn complete_structured(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        shape: &ResponseShape,
    ) -> Result<Value> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .temperature(temperature)
            .messages(Self::messages(system, user))
            .response_format(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    name: shape.name.clone(),
                    description: shape.description.clone(),
                    schema: Some(shape.schema.clone()),
                    strict: Some(true),
                },
            });

        let content = self.send(&mut args).await?;
        parse_json_object(&content)
    }
}
