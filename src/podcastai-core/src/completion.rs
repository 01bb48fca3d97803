//! Completion service interface shared by the summarization and dialogue stages.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{PodcastError, Result};

/// JSON schema a structured completion must satisfy.
#[derive(Debug, Clone)]
pub struct ResponseShape {
    pub name: String,
    pub description: Option<String>,
    pub schema: Value,
}

/// A large-language-model completion endpoint.
///
/// Calls are made once; implementations must not retry, because a repeated
/// generative call can return different content.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Free-text completion.
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String>;

    /// Completion constrained to `shape`. Output that is not a JSON object is
    /// a `SchemaViolation`; field-level checks are left to the caller.
    async fn complete_structured(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        shape: &ResponseShape,
    ) -> Result<Value>;
}

/// Sanitize model output by stripping reasoning tokens and XML-like tags.
///
/// Removes patterns like <think>...</think> that some OpenAI-compatible
/// servers leave in the content.
pub fn sanitize_response(response: &str) -> String {
    let tags_to_strip = [
        "thinking",
        "think",
        "reflection",
        "reasoning",
        "thought",
        "scratchpad",
    ];

    let mut result = response.to_string();

    for tag in &tags_to_strip {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = regex::Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    result.trim().to_string()
}

/// Parse structured output, tolerating a surrounding markdown code fence.
pub fn parse_json_object(content: &str) -> Result<Value> {
    let cleaned = sanitize_response(content);
    let body = match regex::Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$") {
        Ok(fence) => fence
            .captures(&cleaned)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or(cleaned),
        Err(_) => cleaned,
    };

    let value: Value = serde_json::from_str(&body)
        .map_err(|e| PodcastError::SchemaViolation(format!("response is not valid JSON: {}", e)))?;

    if !value.is_object() {
        return Err(PodcastError::SchemaViolation(
            "response is not a JSON object".to_string(),
        ));
    }
    Ok(value)
}
