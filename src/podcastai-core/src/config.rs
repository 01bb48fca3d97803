//! Configuration module for loading TOML config files.
//!
//! Every section has embedded defaults, so a config file only needs to
//! name the values it overrides.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PodcastError;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub podcast: PodcastConfig,
    pub models: ModelsConfig,
    pub chunking: ChunkingConfig,
    pub prompts: PromptsConfig,
    pub voices: VoicesConfig,
    pub ambient: AmbientConfig,
    pub mix: MixConfig,
    pub cover: CoverConfig,
    pub network: NetworkConfig,
    pub paths: PathsConfig,
}

/// Podcast identity used by the dialogue prompt.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PodcastConfig {
    pub name: String,
}

impl Default for PodcastConfig {
    fn default() -> Self {
        Self {
            name: "Birds are awsome!".to_string(),
        }
    }
}

/// Completion model settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub completion_model: String,
    pub summary_temperature: f32,
    pub dialogue_temperature: f32,
    /// Number of map-step requests in flight at once. 1 keeps the map step sequential.
    pub map_concurrency: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            completion_model: "gpt-3.5-turbo".to_string(),
            summary_temperature: 0.0,
            dialogue_temperature: 1.3,
            map_concurrency: 1,
        }
    }
}

/// Text chunking settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    /// Preferred split points, highest priority first.
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            separators: vec![
                "\n\n\n=".to_string(),
                "\n\n".to_string(),
                "\n".to_string(),
            ],
        }
    }
}

/// Instructions sent to the completion service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub map_instruction: String,
    pub reduce_instruction: String,
    /// Dialogue system prompt, `{podcast_name}` is replaced.
    pub dialogue_template: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            map_instruction: DEFAULT_MAP_INSTRUCTION.to_string(),
            reduce_instruction: DEFAULT_REDUCE_INSTRUCTION.to_string(),
            dialogue_template: DEFAULT_DIALOGUE_TEMPLATE.to_string(),
        }
    }
}

/// Speech output container requested from the speech provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceFormat {
    /// MP3 frames; concatenated clips stay a playable stream.
    Mp3,
    /// Headerless 16-bit little-endian mono PCM at the given rate.
    Pcm { sample_rate: u32 },
}

impl VoiceFormat {
    /// Value of the `output_format` query parameter.
    pub fn output_format(&self) -> String {
        match self {
            VoiceFormat::Mp3 => "mp3_44100_128".to_string(),
            VoiceFormat::Pcm { sample_rate } => format!("pcm_{}", sample_rate),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            VoiceFormat::Mp3 => "mp3",
            VoiceFormat::Pcm { .. } => "pcm",
        }
    }
}

/// Voice configuration for TTS.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoicesConfig {
    /// Speaker name to provider voice id.
    pub speakers: BTreeMap<String, String>,
    pub stability: f32,
    pub similarity_boost: f32,
    pub model_id: Option<String>,
    pub format: VoiceFormat,
    /// Speaker name to kokoro voice, used with the offline speech engine.
    pub local_speakers: BTreeMap<String, String>,
}

impl Default for VoicesConfig {
    fn default() -> Self {
        let mut speakers = BTreeMap::new();
        // Mark is voiced by "Jeremy", Anna by "Glinda".
        speakers.insert("Mark".to_string(), "bVMeCyTHy58xNoL34h3p".to_string());
        speakers.insert("Anna".to_string(), "z9fAnlkpzviPz146aGWa".to_string());
        let mut local_speakers = BTreeMap::new();
        local_speakers.insert("Mark".to_string(), "am_michael".to_string());
        local_speakers.insert("Anna".to_string(), "af_heart".to_string());
        Self {
            speakers,
            stability: 0.0,
            similarity_boost: 0.0,
            model_id: None,
            format: VoiceFormat::Mp3,
            local_speakers,
        }
    }
}

/// How the ambient asset cache decides whether a file on disk is reusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Any existing file is reused.
    #[default]
    Existence,
    /// Reuse only when the sidecar hash matches the current generation parameters.
    Fingerprint,
}

/// Intro music bed and sound effect generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    pub directory: PathBuf,
    pub music_file: String,
    pub effect_file: String,
    pub music_prompt: String,
    pub effect_prompt: String,
    pub music_duration_secs: u32,
    pub effect_duration_secs: u32,
    pub music_model: String,
    pub effect_model: String,
    pub top_k: u32,
    pub cache_policy: CachePolicy,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("audios"),
            music_file: "intro_main_song.wav".to_string(),
            effect_file: "intro_bird_effect.wav".to_string(),
            music_prompt: "earthy tones, environmentally conscious, ukulele-infused, harmonic, breezy, easygoing, organic instrumentation, gentle grooves".to_string(),
            effect_prompt: "sounds of birds".to_string(),
            music_duration_secs: 15,
            effect_duration_secs: 5,
            music_model: "facebook/musicgen-small".to_string(),
            effect_model: "facebook/audiogen-medium".to_string(),
            top_k: 250,
            cache_policy: CachePolicy::Existence,
        }
    }
}

impl AmbientConfig {
    pub fn music_path(&self) -> PathBuf {
        self.directory.join(&self.music_file)
    }

    pub fn effect_path(&self) -> PathBuf {
        self.directory.join(&self.effect_file)
    }
}

/// Timing and gain constants of the episode mix.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    pub intro_length_ms: u64,
    pub effect_repetitions: usize,
    pub effect_gain_db: f32,
    pub crossfade_ms: u64,
    pub intro_fade_in_ms: u64,
    pub voice_gain_db: f32,
    pub outro_fade_in_ms: u64,
    pub export_sample_rate: u32,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            intro_length_ms: 15_000,
            effect_repetitions: 5,
            effect_gain_db: 3.0,
            crossfade_ms: 1_500,
            intro_fade_in_ms: 1_000,
            voice_gain_db: 4.5,
            outro_fade_in_ms: 1_000,
            export_sample_rate: 44_100,
        }
    }
}

/// Cover image generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    /// Image prompt, `{topic}` is replaced.
    pub prompt_template: String,
    pub negative_prompt: String,
    pub seed: u64,
    pub inference_steps: u32,
    /// Fraction of denoising done by the base model before the refiner takes over.
    pub high_noise_frac: f32,
    pub base_model: String,
    pub refiner_model: String,
    pub directory: PathBuf,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            prompt_template: DEFAULT_COVER_TEMPLATE.to_string(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            seed: 42,
            inference_steps: 40,
            high_noise_frac: 0.8,
            base_model: "stabilityai/stable-diffusion-xl-base-1.0".to_string(),
            refiner_model: "stabilityai/stable-diffusion-xl-refiner-1.0".to_string(),
            directory: PathBuf::from("covers"),
        }
    }
}

impl CoverConfig {
    /// Get the cover prompt for a topic.
    pub fn prompt_for(&self, topic: &str) -> String {
        self.prompt_template.replace("{topic}", topic)
    }
}

/// Timeouts applied to every provider HTTP client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
            connect_timeout_secs: 30,
        }
    }
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Output locations for per-episode artifacts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub episodes_dir: PathBuf,
    pub full_episodes_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            episodes_dir: PathBuf::from("audios/episodes"),
            full_episodes_dir: PathBuf::from("audios/full_episodes"),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PodcastError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| PodcastError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, PodcastError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| PodcastError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a stage meaningless.
    pub fn validate(&self) -> Result<(), PodcastError> {
        if self.chunking.max_tokens == 0 {
            return Err(PodcastError::ConfigError(
                "chunking.max_tokens must be greater than zero".to_string(),
            ));
        }
        if self.chunking.separators.iter().any(|s| s.is_empty()) {
            return Err(PodcastError::ConfigError(
                "chunking.separators must not contain empty strings".to_string(),
            ));
        }
        if self.models.map_concurrency == 0 {
            return Err(PodcastError::ConfigError(
                "models.map_concurrency must be at least 1".to_string(),
            ));
        }
        if self.mix.export_sample_rate == 0 {
            return Err(PodcastError::ConfigError(
                "mix.export_sample_rate must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the dialogue system prompt with the podcast name filled in.
    pub fn dialogue_prompt(&self) -> String {
        self.prompts
            .dialogue_template
            .replace("{podcast_name}", &self.podcast.name)
    }

    pub fn voice_track_path(&self, slug: &str) -> PathBuf {
        self.paths
            .episodes_dir
            .join(format!("ep_{}.{}", slug, self.voices.format.extension()))
    }

    pub fn script_path(&self, slug: &str) -> PathBuf {
        self.paths.episodes_dir.join(format!("ep_{}.json", slug))
    }

    pub fn full_episode_path(&self, slug: &str) -> PathBuf {
        self.paths
            .full_episodes_dir
            .join(format!("full_ep_{}.wav", slug))
    }

    pub fn cover_path(&self, slug: &str) -> PathBuf {
        self.cover.directory.join(format!("{}.jpg", slug))
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}

/// API credentials, read once by the caller and handed to each provider client.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub huggingface_token: Option<String>,
}

impl Credentials {
    /// Look up a required credential, naming the environment variable on failure.
    pub fn require<'a>(value: &'a Option<String>, var: &str) -> Result<&'a str, PodcastError> {
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| PodcastError::ConfigError(format!("{} is not set", var)))
    }
}

const DEFAULT_MAP_INSTRUCTION: &str = r#"You are a bird enthusiast who has a podcast about birds. Given a text about a bird, extract some key information about this bird and curiosities that you could share on your next podcast.
Also include cultural curiosities about the bird if mentioned in the text.
Answer with the highlights only."#;

const DEFAULT_REDUCE_INSTRUCTION: &str = r#"You will be given with summary with facts about a bird. Divide these facts into main topics, and provide the output in the format of a list, something like:

Topic 1:
- Highlight 1
- Highlight 2
- Highlight 3
"#;

const DEFAULT_DIALOGUE_TEMPLATE: &str = r#"Generate the script of a podcast episode between Mark and Anna. Mark is a bird enthusiast and is the host of the podcast. Anna is a bird expert who came to the episode to discuss about a bird. Given a text with facts about this bird, create a conversation between them, discussing the facts present in the text. At the begining of the podcast, make them introduce themselves initially. Make the dialogue casual, funny and informative. Avoid repetetive expressions or repeting the name of the bird to many times. The name of the podcast is '{podcast_name}'"#;

const DEFAULT_COVER_TEMPLATE: &str = "Pop art illustration of a {topic}, comic book-inspired, vivid and contrasting colors, layered composition, retro flair, lively and expressive";

const DEFAULT_NEGATIVE_PROMPT: &str = "multiple birds, out of frame, lowres, text, error, cropped, worst quality, low quality, duplicate, morbid, mutilated, out of frame, extra fingers, mutated hands, poorly drawn hands, poorly drawn face, mutation, deformed, blurry, dehydrated, bad anatomy, bad proportions, extra limbs, cloned face, disfigured, gross proportions, malformed limbs, missing arms, missing legs, extra arms, extra legs, fused fingers, too many fingers, long neck, username, watermark, signature";
