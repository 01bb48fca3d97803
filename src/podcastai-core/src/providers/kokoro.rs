//! Offline speech synthesis using kokoro-tiny.

use async_trait::async_trait;
use kokoro_tiny::TtsEngine;
use tokio::sync::Mutex;
use tracing::debug;

use crate::audio::codec;
use crate::config::VoiceFormat;
use crate::error::{PodcastError, Result};
use crate::speech::{SpeechProvider, VoiceSettings};

/// Output rate of the kokoro model.
pub const SAMPLE_RATE: u32 = 24_000;
/// Kokoro mispronounces or truncates inputs much longer than this.
const MAX_CHUNK_CHARS: usize = 200;
/// Pause between chunks of one line, 0.3 s.
const CHUNK_GAP_SAMPLES: usize = 7_200;

/// Local speech provider. Clips are raw 16-bit PCM at 24 kHz so that
/// byte concatenation of clips stays a valid track.
pub struct KokoroSpeech {
    engine: Mutex<TtsEngine>,
    available_voices: Vec<String>,
}

impl KokoroSpeech {
    /// Load the model, downloading it on first use.
    pub async fn new() -> Result<Self> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| PodcastError::ConfigError(format!("Failed to initialize kokoro: {}", e)))?;
        let available_voices = engine.voices();

        Ok(Self {
            engine: Mutex::new(engine),
            available_voices,
        })
    }

    /// The track format this provider produces.
    pub fn voice_format() -> VoiceFormat {
        VoiceFormat::Pcm {
            sample_rate: SAMPLE_RATE,
        }
    }

    pub fn available_voices(&self) -> &[String] {
        &self.available_voices
    }

    fn validate_voice(&self, voice_id: &str) -> Result<()> {
        if self.available_voices.iter().any(|v| v == voice_id) {
            return Ok(());
        }
        let mut english: Vec<&String> = self
            .available_voices
            .iter()
            .filter(|v| ["af_", "am_", "bf_", "bm_"].iter().any(|p| v.starts_with(p)))
            .collect();
        english.sort();
        Err(PodcastError::ConfigError(format!(
            "Unknown kokoro voice '{}'. Available voices: {}",
            voice_id,
            english
                .iter()
                .map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}

#[async_trait]
impl SpeechProvider for KokoroSpeech {
    async fn synthesize(&self, text: &str, voice_id: &str, _settings: &VoiceSettings) -> Result<Vec<u8>> {
        self.validate_voice(voice_id)?;

        let mut engine = self.engine.lock().await;
        let mut samples = Vec::new();
        for chunk in split_into_chunks(text, MAX_CHUNK_CHARS) {
            let rendered = engine
                .synthesize(&chunk, Some(voice_id))
                .map_err(|e| PodcastError::provider("kokoro", format!("Synthesis failed: {}", e)))?;
            samples.extend(rendered);
            samples.extend(std::iter::repeat_n(0.0, CHUNK_GAP_SAMPLES));
        }
        debug!(voice_id, samples = samples.len(), "kokoro clip rendered");

        Ok(codec::encode_pcm_s16le(&samples))
    }
}

/// Split text at sentence ends, then commas, into pieces of at most `max_chars`
/// where the punctuation allows it.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    let mut push_part = |part: &str, current: &mut String| {
        if !current.is_empty() && current.len() + part.len() > max_chars {
            chunks.push(current.trim().to_string());
            current.clear();
        }
        current.push_str(part);
        current.push(' ');
    };

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        if sentence.len() > max_chars {
            for part in sentence.split_inclusive(',') {
                push_part(part.trim(), &mut current);
            }
        } else {
            push_part(sentence, &mut current);
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }
    chunks
}
