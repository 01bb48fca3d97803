//! Episode assembly: intro bed layering, crossfade, gain staging and export.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::audio::codec;
use crate::audio::{AudioBuffer, OverlayOptions};
use crate::config::{MixConfig, VoiceFormat};
use crate::error::{PodcastError, Result};

/// The named steps of the mix, in the only order they may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixStep {
    Conform,
    TruncateBed,
    OverlayEffect,
    CrossfadeEffect,
    FadeInIntro,
    BoostVoice,
    Concatenate,
}

impl MixStep {
    pub fn name(&self) -> &'static str {
        match self {
            MixStep::Conform => "conform sample rates",
            MixStep::TruncateBed => "truncate music bed",
            MixStep::OverlayEffect => "overlay effect bed",
            MixStep::CrossfadeEffect => "crossfade effect tail",
            MixStep::FadeInIntro => "fade in intro",
            MixStep::BoostVoice => "boost voice track",
            MixStep::Concatenate => "concatenate episode",
        }
    }
}

/// Final episode audio plus the lengths of its three sections.
#[derive(Debug, Clone)]
pub struct AssembledEpisode {
    pub audio: AudioBuffer,
    /// Sample counts of intro, voice and outro; they add up to `audio.len()`.
    pub intro_len: usize,
    pub voice_len: usize,
    pub outro_len: usize,
    /// Steps executed, with the length in ms of the buffer each produced.
    pub steps: Vec<(MixStep, u64)>,
}

impl AssembledEpisode {
    pub fn duration_secs(&self) -> f64 {
        self.audio.duration_secs()
    }
}

/// Combines the intro beds and the voice track into one episode.
pub struct Assembler {
    mix: MixConfig,
}

impl Assembler {
    pub fn new(mix: MixConfig) -> Self {
        Self { mix }
    }

    pub fn mix_config(&self) -> &MixConfig {
        &self.mix
    }

    /// Run the mix over in-memory buffers. Inputs are left untouched.
    pub fn assemble(
        &self,
        music_bed: &AudioBuffer,
        effect_bed: &AudioBuffer,
        voice_track: &AudioBuffer,
    ) -> Result<AssembledEpisode> {
        let mut steps = Vec::with_capacity(7);
        let rate = self.mix.export_sample_rate;

        let music_bed = music_bed.resample(rate);
        let effect_bed = effect_bed.resample(rate);
        let voice_track = voice_track.resample(rate);
        steps.push((MixStep::Conform, music_bed.duration_ms()));

        let bed = music_bed.truncate_ms(self.mix.intro_length_ms);
        steps.push((MixStep::TruncateBed, bed.duration_ms()));

        let music_with_effect = bed.overlay(
            &effect_bed,
            OverlayOptions {
                position_ms: 0,
                times: self.mix.effect_repetitions,
                gain_db: self.mix.effect_gain_db,
            },
        )?;
        steps.push((MixStep::OverlayEffect, music_with_effect.duration_ms()));

        let final_intro = music_with_effect.append_crossfade(&effect_bed, self.mix.crossfade_ms)?;
        steps.push((MixStep::CrossfadeEffect, final_intro.duration_ms()));

        let final_intro = final_intro.fade_in(self.mix.intro_fade_in_ms);
        steps.push((MixStep::FadeInIntro, final_intro.duration_ms()));

        let voice = voice_track.apply_gain(self.mix.voice_gain_db);
        steps.push((MixStep::BoostVoice, voice.duration_ms()));

        let outro = music_with_effect.fade_in(self.mix.outro_fade_in_ms);
        let audio = final_intro.concat(&voice)?.concat(&outro)?;
        steps.push((MixStep::Concatenate, audio.duration_ms()));

        for (step, ms) in &steps {
            debug!(step = step.name(), duration_ms = ms, "mix step");
        }

        Ok(AssembledEpisode {
            intro_len: final_intro.len(),
            voice_len: voice.len(),
            outro_len: outro.len(),
            audio,
            steps,
        })
    }

    /// Load the three inputs from disk, mix, and export the episode as WAV.
    ///
    /// Any missing input is fatal; nothing is substituted with silence.
    pub fn assemble_files(
        &self,
        music_path: &Path,
        effect_path: &Path,
        voice_path: &Path,
        voice_format: VoiceFormat,
        output_path: &Path,
    ) -> Result<AssembledEpisode> {
        let music_bed = codec::decode_file(music_path)?;
        let effect_bed = codec::decode_file(effect_path)?;
        let voice_track = load_voice_track(voice_path, voice_format)?;

        let episode = self.assemble(&music_bed, &effect_bed, &voice_track)?;
        codec::write_wav(output_path, &episode.audio)?;

        info!(
            path = %output_path.display(),
            duration_secs = %format!("{:.1}", episode.duration_secs()),
            "exported full episode"
        );
        Ok(episode)
    }
}

/// Read a rendered voice track in the container it was requested in.
pub fn load_voice_track(path: &Path, format: VoiceFormat) -> Result<AudioBuffer> {
    match format {
        VoiceFormat::Mp3 => codec::decode_file(path),
        VoiceFormat::Pcm { sample_rate } => {
            if !path.exists() {
                return Err(PodcastError::MissingAsset {
                    path: path.to_path_buf(),
                });
            }
            let bytes = fs::read(path)?;
            Ok(codec::decode_pcm_s16le(&bytes, sample_rate))
        }
    }
}
