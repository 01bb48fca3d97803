//! Episode pipeline.
//!
//! Runs the stages as one straight line: acquisition, chunking,
//! summarization, dialogue, voice rendering, ambient beds, assembly, cover.
//! Nothing is retried and the first failure ends the run, tagged with the
//! stage it came from.

use std::path::PathBuf;

use serde_json::to_vec_pretty;
use tracing::{info, warn};

use crate::ambient::{AmbientAssetCache, AmbientReport, AudioGenerator};
use crate::audio::{Assembler, codec};
use crate::chunker::{TextChunk, TextChunker};
use crate::completion::CompletionService;
use crate::config::Config;
use crate::cover::{ImageGenerator, generate_cover};
use crate::dialogue::{DialogueScript, Speaker, generate_dialogue};
use crate::error::{PodcastError, Stage, StageContext, StageError};
use crate::source::TextProvider;
use crate::speech::{SpeechProvider, VoiceMap, VoiceSettings, render_to_file};
use crate::summarize::{SummarizeOptions, summarize};

/// The external services one run talks to.
pub struct Providers {
    pub text: Box<dyn TextProvider>,
    pub completion: Box<dyn CompletionService>,
    pub speech: Box<dyn SpeechProvider>,
    pub music: Box<dyn AudioGenerator>,
    pub effects: Box<dyn AudioGenerator>,
    /// Needed only when the cover is rendered.
    pub images: Option<Box<dyn ImageGenerator>>,
}

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Render only the first N dialogue lines. Off by default.
    pub max_lines: Option<usize>,
    pub skip_cover: bool,
}

/// Callback for pipeline events.
pub type PipelineCallback = Box<dyn Fn(PipelineEvent) + Send + Sync>;

/// Events emitted during a run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A stage is starting.
    StageStart { stage: Stage },
    /// A stage finished, with a one-line summary of what it produced.
    StageDone { stage: Stage, detail: String },
    /// One line of the generated script, in speaking order.
    DialogueLine { speaker: Speaker, text: String },
    /// The episode has been exported.
    EpisodeEnd,
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct EpisodeReport {
    pub topic: String,
    pub slug: String,
    pub chunk_count: usize,
    pub oversized_chunks: usize,
    pub script: DialogueScript,
    pub script_path: PathBuf,
    pub voice_track_path: PathBuf,
    pub ambient: AmbientReport,
    pub episode_path: PathBuf,
    pub intro_secs: f64,
    pub voice_secs: f64,
    pub outro_secs: f64,
    pub duration_secs: f64,
    pub cover_path: Option<PathBuf>,
}

pub struct PodcastPipeline {
    config: Config,
    providers: Providers,
    chunker: TextChunker,
    callback: Option<PipelineCallback>,
}

impl PodcastPipeline {
    /// Fails only when the tokenizer vocabulary cannot be loaded.
    pub fn new(config: Config, providers: Providers) -> Result<Self, PodcastError> {
        let chunker = TextChunker::from_config(&config.chunking)?;
        Ok(Self {
            config,
            providers,
            chunker,
            callback: None,
        })
    }

    /// Replace the default token counter based chunker.
    pub fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Set a callback for pipeline events.
    pub fn with_callback(mut self, callback: PipelineCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Source text to validated dialogue script: chunk, summarize, write the dialogue.
    pub async fn create_dialogue(&self, text: &str) -> Result<DialogueScript, StageError> {
        let chunks = self.chunk(text);
        self.dialogue_from_chunks(&chunks).await
    }

    /// Produce the full episode for `topic`, writing every artifact under `slug`.
    pub async fn run(&self, topic: &str, slug: &str, options: &RunOptions) -> Result<EpisodeReport, StageError> {
        info!(topic, slug, "starting episode");

        self.emit_event(PipelineEvent::StageStart {
            stage: Stage::TextAcquisition,
        });
        let document = self
            .providers
            .text
            .fetch(topic)
            .await
            .stage(Stage::TextAcquisition)?;
        self.emit_event(PipelineEvent::StageDone {
            stage: Stage::TextAcquisition,
            detail: format!("'{}', {} characters", document.topic, document.text.len()),
        });

        let chunks = self.chunk(&document.text);
        let oversized_chunks = chunks
            .iter()
            .filter(|c| c.is_oversized(self.chunker.max_tokens()))
            .count();

        let mut script = self.dialogue_from_chunks(&chunks).await?;
        if let Some(max_lines) = options.max_lines {
            if max_lines < script.len() {
                warn!(max_lines, total = script.len(), "truncating dialogue script");
                script = script.truncated(max_lines);
            }
        }
        let script_path = self.config.script_path(slug);
        to_vec_pretty(&script)
            .map_err(PodcastError::from)
            .and_then(|json| codec::write_atomic(&script_path, &json))
            .stage(Stage::DialogueSynthesis)?;

        self.emit_event(PipelineEvent::StageStart {
            stage: Stage::VoiceRendering,
        });
        let voice_track_path = self.config.voice_track_path(slug);
        let settings = VoiceSettings {
            stability: self.config.voices.stability,
            similarity_boost: self.config.voices.similarity_boost,
        };
        let track = render_to_file(
            self.providers.speech.as_ref(),
            &script,
            &VoiceMap::from_config(&self.config.voices),
            &settings,
            &voice_track_path,
        )
        .await
        .stage(Stage::VoiceRendering)?;
        self.emit_event(PipelineEvent::StageDone {
            stage: Stage::VoiceRendering,
            detail: format!("{} clips, {} bytes", track.clip_count, track.bytes.len()),
        });

        self.emit_event(PipelineEvent::StageStart {
            stage: Stage::AmbientAssets,
        });
        let cache = AmbientAssetCache::new(
            self.providers.music.as_ref(),
            self.providers.effects.as_ref(),
            &self.config.ambient,
        );
        let ambient = cache.ensure_all().await.stage(Stage::AmbientAssets)?;
        self.emit_event(PipelineEvent::StageDone {
            stage: Stage::AmbientAssets,
            detail: format!(
                "music {:?}, effect {:?}, {} generator calls",
                ambient.music, ambient.effect, ambient.generator_calls
            ),
        });

        self.emit_event(PipelineEvent::StageStart {
            stage: Stage::AudioAssembly,
        });
        let episode_path = self.config.full_episode_path(slug);
        let episode = Assembler::new(self.config.mix.clone())
            .assemble_files(
                &self.config.ambient.music_path(),
                &self.config.ambient.effect_path(),
                &voice_track_path,
                self.config.voices.format,
                &episode_path,
            )
            .stage(Stage::AudioAssembly)?;
        let rate = episode.audio.sample_rate() as f64;
        self.emit_event(PipelineEvent::StageDone {
            stage: Stage::AudioAssembly,
            detail: format!("{:.1} s at {}", episode.duration_secs(), episode_path.display()),
        });

        let cover_path = if options.skip_cover {
            info!("cover generation skipped");
            None
        } else {
            Some(self.render_cover(topic, slug).await?)
        };

        self.emit_event(PipelineEvent::EpisodeEnd);
        Ok(EpisodeReport {
            topic: document.topic,
            slug: slug.to_string(),
            chunk_count: chunks.len(),
            oversized_chunks,
            script,
            script_path,
            voice_track_path,
            ambient,
            episode_path,
            intro_secs: episode.intro_len as f64 / rate,
            voice_secs: episode.voice_len as f64 / rate,
            outro_secs: episode.outro_len as f64 / rate,
            duration_secs: episode.duration_secs(),
            cover_path,
        })
    }

    fn chunk(&self, text: &str) -> Vec<TextChunk> {
        self.emit_event(PipelineEvent::StageStart {
            stage: Stage::Chunking,
        });
        let chunks = self.chunker.split(text);
        self.emit_event(PipelineEvent::StageDone {
            stage: Stage::Chunking,
            detail: format!("{} chunks", chunks.len()),
        });
        chunks
    }

    async fn dialogue_from_chunks(&self, chunks: &[TextChunk]) -> Result<DialogueScript, StageError> {
        self.emit_event(PipelineEvent::StageStart {
            stage: Stage::Summarization,
        });
        let options = SummarizeOptions::from_config(&self.config.prompts, &self.config.models);
        let summary = summarize(self.providers.completion.as_ref(), chunks, &options)
            .await
            .stage(Stage::Summarization)?;
        self.emit_event(PipelineEvent::StageDone {
            stage: Stage::Summarization,
            detail: format!("{} characters", summary.as_str().len()),
        });

        self.emit_event(PipelineEvent::StageStart {
            stage: Stage::DialogueSynthesis,
        });
        let script = generate_dialogue(
            self.providers.completion.as_ref(),
            &summary,
            &self.config.dialogue_prompt(),
            self.config.models.dialogue_temperature,
        )
        .await
        .stage(Stage::DialogueSynthesis)?;
        for line in script.lines() {
            self.emit_event(PipelineEvent::DialogueLine {
                speaker: line.speaker_name,
                text: line.speaker_text.clone(),
            });
        }
        self.emit_event(PipelineEvent::StageDone {
            stage: Stage::DialogueSynthesis,
            detail: format!("{} lines", script.len()),
        });
        Ok(script)
    }

    async fn render_cover(&self, topic: &str, slug: &str) -> Result<PathBuf, StageError> {
        self.emit_event(PipelineEvent::StageStart {
            stage: Stage::CoverGeneration,
        });
        let images = self.providers.images.as_deref().ok_or_else(|| {
            StageError::new(
                Stage::CoverGeneration,
                PodcastError::ConfigError("no image generator configured".to_string()),
            )
        })?;

        let path = self.config.cover_path(slug);
        let bytes = generate_cover(images, &self.config.cover, topic, &path)
            .await
            .stage(Stage::CoverGeneration)?;
        self.emit_event(PipelineEvent::StageDone {
            stage: Stage::CoverGeneration,
            detail: format!("{} bytes at {}", bytes, path.display()),
        });
        Ok(path)
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: PipelineEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}
