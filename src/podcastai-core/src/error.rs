//! Error types for the podcast pipeline.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while fetching source text for a topic.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("No page found for topic '{topic}'")]
    NotFound { topic: String },

    #[error("Topic '{topic}' resolves to a disambiguation page")]
    Ambiguous { topic: String },

    #[error("Page for topic '{topic}' has no text content")]
    Empty { topic: String },
}

#[derive(Error, Debug)]
pub enum PodcastError {
    #[error("Source text unavailable: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Structured output does not match the dialogue schema: {0}")]
    SchemaViolation(String),

    #[error("{provider} request failed{}: {message}", status_suffix(.status))]
    Provider {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{provider} request timed out")]
    Timeout { provider: String },

    #[error("Required asset is missing: {}", .path.display())]
    MissingAsset { path: PathBuf },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|s| format!(" with status {}", s))
        .unwrap_or_default()
}

impl PodcastError {
    /// Wrap a transport error from a named provider, keeping timeouts distinct.
    pub fn http(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return PodcastError::Timeout {
                provider: provider.to_string(),
            };
        }
        PodcastError::Provider {
            provider: provider.to_string(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }

    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        PodcastError::Provider {
            provider: provider.to_string(),
            status: None,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PodcastError>;

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    TextAcquisition,
    Chunking,
    Summarization,
    DialogueSynthesis,
    VoiceRendering,
    AmbientAssets,
    AudioAssembly,
    CoverGeneration,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::TextAcquisition => "text-acquisition",
            Stage::Chunking => "chunking",
            Stage::Summarization => "summarization",
            Stage::DialogueSynthesis => "dialogue-synthesis",
            Stage::VoiceRendering => "voice-rendering",
            Stage::AmbientAssets => "ambient-assets",
            Stage::AudioAssembly => "audio-assembly",
            Stage::CoverGeneration => "cover-generation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pipeline failure tagged with the stage that produced it.
#[derive(Error, Debug)]
#[error("[{stage}] {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: PodcastError,
}

impl StageError {
    pub fn new(stage: Stage, source: PodcastError) -> Self {
        Self { stage, source }
    }
}

/// Attach a stage to the error side of a result.
pub trait StageContext<T> {
    fn stage(self, stage: Stage) -> std::result::Result<T, StageError>;
}

impl<T> StageContext<T> for Result<T> {
    fn stage(self, stage: Stage) -> std::result::Result<T, StageError> {
        self.map_err(|e| StageError::new(stage, e))
    }
}
