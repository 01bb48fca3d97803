//! PodcastAI Core Library
//!
//! Turns a topic into a two-host podcast episode: source text, map-reduce
//! summary, structured dialogue, voice track, intro beds, final mix and cover.

pub mod ambient;
pub mod audio;
pub mod chunker;
pub mod completion;
pub mod config;
pub mod cover;
pub mod dialogue;
pub mod error;
pub mod pipeline;
pub mod providers;
pub mod source;
pub mod speech;
pub mod summarize;

pub use ambient::{AmbientAsset, AmbientAssetCache, AmbientReport, AudioGenerator, CacheOutcome};
pub use audio::{AssembledEpisode, Assembler, AudioBuffer};
pub use chunker::{SourceDocument, TextChunk, TextChunker};
pub use completion::{CompletionService, ResponseShape};
pub use config::{Config, Credentials, default_config};
pub use cover::{ImageGenerator, ImageRequest};
pub use dialogue::{DialogueLine, DialogueScript, Speaker};
pub use error::{AcquisitionError, PodcastError, Stage, StageError};
pub use pipeline::{EpisodeReport, PipelineEvent, PodcastPipeline, Providers, RunOptions};
pub use source::TextProvider;
pub use speech::{EpisodeVoiceTrack, SpeechProvider, VoiceMap, VoiceSettings};
pub use summarize::FactSummary;
