//! Voice rendering: one speech clip per dialogue line, concatenated in script order.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::audio::codec;
use crate::config::VoicesConfig;
use crate::dialogue::{DialogueScript, Speaker};
use crate::error::{PodcastError, Result};

/// Provider-side voice generation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.0,
            similarity_boost: 0.0,
        }
    }
}

/// A text-to-speech backend.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Render `text` with the given voice and return the encoded audio bytes.
    async fn synthesize(&self, text: &str, voice_id: &str, settings: &VoiceSettings) -> Result<Vec<u8>>;
}

/// Audio for one dialogue line.
#[derive(Debug, Clone)]
pub struct VoiceClip {
    pub speaker: Speaker,
    pub bytes: Vec<u8>,
}

/// All clips of a script, joined end to end.
#[derive(Debug, Clone, Default)]
pub struct EpisodeVoiceTrack {
    pub bytes: Vec<u8>,
    pub clip_count: usize,
}

impl EpisodeVoiceTrack {
    pub fn from_clips(clips: &[VoiceClip]) -> Self {
        let mut bytes = Vec::with_capacity(clips.iter().map(|c| c.bytes.len()).sum());
        for clip in clips {
            bytes.extend_from_slice(&clip.bytes);
        }
        Self {
            bytes,
            clip_count: clips.len(),
        }
    }
}

/// Maps speakers to provider voice ids.
#[derive(Debug, Clone)]
pub struct VoiceMap {
    voices: BTreeMap<String, String>,
}

impl VoiceMap {
    pub fn new(voices: BTreeMap<String, String>) -> Self {
        Self { voices }
    }

    pub fn from_config(config: &VoicesConfig) -> Self {
        Self::new(config.speakers.clone())
    }

    pub fn voice_for(&self, speaker: Speaker) -> Result<&str> {
        self.voices
            .get(speaker.as_str())
            .map(String::as_str)
            .ok_or_else(|| {
                PodcastError::ConfigError(format!(
                    "No voice configured for speaker '{}'",
                    speaker
                ))
            })
    }
}

/// Render every line of `script` and join the clips in order.
///
/// All speakers are resolved before the first provider call, so an
/// unresolvable speaker produces no audio at all.
pub async fn render_script(
    provider: &dyn SpeechProvider,
    script: &DialogueScript,
    voices: &VoiceMap,
    settings: &VoiceSettings,
) -> Result<EpisodeVoiceTrack> {
    if script.is_empty() {
        return Err(PodcastError::ConfigError(
            "dialogue script has no lines to render".to_string(),
        ));
    }
    let voice_ids = script
        .lines()
        .iter()
        .map(|line| voices.voice_for(line.speaker_name))
        .collect::<Result<Vec<_>>>()?;

    let mut clips = Vec::with_capacity(script.len());
    for (i, (line, voice_id)) in script.lines().iter().zip(voice_ids).enumerate() {
        let bytes = provider
            .synthesize(&line.speaker_text, voice_id, settings)
            .await?;
        debug!(line = i, speaker = %line.speaker_name, bytes = bytes.len(), "rendered line");
        clips.push(VoiceClip {
            speaker: line.speaker_name,
            bytes,
        });
    }

    Ok(EpisodeVoiceTrack::from_clips(&clips))
}

/// Render `script` and write the track to `path` in one atomic write.
pub async fn render_to_file(
    provider: &dyn SpeechProvider,
    script: &DialogueScript,
    voices: &VoiceMap,
    settings: &VoiceSettings,
    path: &Path,
) -> Result<EpisodeVoiceTrack> {
    let track = render_script(provider, script, voices, settings).await?;
    codec::write_atomic(path, &track.bytes)?;
    info!(
        path = %path.display(),
        clips = track.clip_count,
        bytes = track.bytes.len(),
        "voice track written"
    );
    Ok(track)
}
