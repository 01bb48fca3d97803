//! Intro music and sound-effect beds, generated once and reused from disk.
//!
//! With [`CachePolicy::Existence`] a file at the asset path is reused no matter
//! which prompt or model produced it. [`CachePolicy::Fingerprint`] also
//! requires a sidecar hash of the generation parameters to match, and
//! regenerates the asset otherwise.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::audio::{AudioBuffer, codec};
use crate::config::{AmbientConfig, CachePolicy};
use crate::error::{PodcastError, Result};

/// Text-to-music or text-to-sound-effect model.
#[async_trait]
pub trait AudioGenerator: Send + Sync {
    fn model_id(&self) -> &str;

    /// One buffer per prompt, in prompt order.
    async fn generate(&self, prompts: &[String], duration_secs: u32) -> Result<Vec<AudioBuffer>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbientAsset {
    IntroMusicBed,
    IntroEffectBed,
}

impl fmt::Display for AmbientAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmbientAsset::IntroMusicBed => f.write_str("intro music bed"),
            AmbientAsset::IntroEffectBed => f.write_str("intro effect bed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Reused,
    Generated,
}

/// What `ensure_all` did for each asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbientReport {
    pub music: CacheOutcome,
    pub effect: CacheOutcome,
    pub generator_calls: usize,
}

struct AssetRequest<'a> {
    path: PathBuf,
    prompt: &'a str,
    duration_secs: u32,
}

pub struct AmbientAssetCache<'a> {
    music: &'a dyn AudioGenerator,
    effects: &'a dyn AudioGenerator,
    config: &'a AmbientConfig,
}

impl<'a> AmbientAssetCache<'a> {
    pub fn new(
        music: &'a dyn AudioGenerator,
        effects: &'a dyn AudioGenerator,
        config: &'a AmbientConfig,
    ) -> Self {
        Self {
            music,
            effects,
            config,
        }
    }

    pub fn path(&self, asset: AmbientAsset) -> PathBuf {
        match asset {
            AmbientAsset::IntroMusicBed => self.config.music_path(),
            AmbientAsset::IntroEffectBed => self.config.effect_path(),
        }
    }

    /// Make sure both beds exist on disk.
    pub async fn ensure_all(&self) -> Result<AmbientReport> {
        let mut generator_calls = 0;
        let music = self.ensure(AmbientAsset::IntroMusicBed, &mut generator_calls).await?;
        let effect = self.ensure(AmbientAsset::IntroEffectBed, &mut generator_calls).await?;
        Ok(AmbientReport {
            music,
            effect,
            generator_calls,
        })
    }

    async fn ensure(&self, asset: AmbientAsset, calls: &mut usize) -> Result<CacheOutcome> {
        let (generator, request) = self.request(asset);
        let fingerprint = fingerprint(generator.model_id(), &request, self.config.top_k);

        if self.is_reusable(&request.path, &fingerprint)? {
            info!(asset = %asset, path = %request.path.display(), "reusing cached asset");
            return Ok(CacheOutcome::Reused);
        }

        info!(asset = %asset, model = generator.model_id(), "generating asset");
        *calls += 1;
        let mut generated = generator
            .generate(&[request.prompt.to_string()], request.duration_secs)
            .await?;
        if generated.is_empty() {
            return Err(PodcastError::provider(
                generator.model_id(),
                format!("no audio returned for the {}", asset),
            ));
        }
        let audio = generated.swap_remove(0);

        codec::write_wav(&request.path, &audio)?;
        if self.config.cache_policy == CachePolicy::Fingerprint {
            codec::write_atomic(&sidecar_path(&request.path), fingerprint.as_bytes())?;
        }
        Ok(CacheOutcome::Generated)
    }

    fn request(&self, asset: AmbientAsset) -> (&'a dyn AudioGenerator, AssetRequest<'a>) {
        match asset {
            AmbientAsset::IntroMusicBed => (
                self.music,
                AssetRequest {
                    path: self.config.music_path(),
                    prompt: &self.config.music_prompt,
                    duration_secs: self.config.music_duration_secs,
                },
            ),
            AmbientAsset::IntroEffectBed => (
                self.effects,
                AssetRequest {
                    path: self.config.effect_path(),
                    prompt: &self.config.effect_prompt,
                    duration_secs: self.config.effect_duration_secs,
                },
            ),
        }
    }

    fn is_reusable(&self, path: &Path, fingerprint: &str) -> Result<bool> {
        if !path.is_file() {
            return Ok(false);
        }
        match self.config.cache_policy {
            CachePolicy::Existence => Ok(true),
            CachePolicy::Fingerprint => {
                let sidecar = sidecar_path(path);
                if !sidecar.is_file() {
                    warn!(path = %path.display(), "cached asset has no fingerprint, regenerating");
                    return Ok(false);
                }
                let stored = fs::read_to_string(&sidecar)?;
                if stored.trim() != fingerprint {
                    warn!(path = %path.display(), "generation parameters changed, regenerating");
                    return Ok(false);
                }
                Ok(true)
            }
        }
    }
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".sha256");
    PathBuf::from(name)
}

fn fingerprint(model_id: &str, request: &AssetRequest<'_>, top_k: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model_id.as_bytes());
    hasher.update([0]);
    hasher.update(request.prompt.as_bytes());
    hasher.update([0]);
    hasher.update(request.duration_secs.to_le_bytes());
    hasher.update(top_k.to_le_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
