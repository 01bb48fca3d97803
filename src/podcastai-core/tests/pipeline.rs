use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;

use podcastai_core::audio::codec;
use podcastai_core::config::VoiceFormat;
use podcastai_core::error::Result;
use podcastai_core::{
    AcquisitionError, AudioBuffer, AudioGenerator, CacheOutcome, CompletionService, Config,
    ImageGenerator, ImageRequest, PipelineEvent, PodcastError, PodcastPipeline, Providers,
    ResponseShape, RunOptions, SourceDocument, SpeechProvider, Stage, TextProvider, VoiceSettings,
};

const RATE: u32 = 8_000;

struct FakeWiki {
    ambiguous: bool,
}

#[async_trait]
impl TextProvider for FakeWiki {
    async fn fetch(&self, topic: &str) -> Result<SourceDocument> {
        if self.ambiguous {
            return Err(AcquisitionError::Ambiguous {
                topic: topic.to_string(),
            }
            .into());
        }
        Ok(SourceDocument::new(
            topic,
            "The robin is a small bird.\n\n\n== Behaviour ==\nRobins sing at dawn.",
        ))
    }
}

#[derive(Clone)]
struct FakeCompletion {
    calls: Arc<Mutex<Vec<String>>>,
    dialogue: Value,
}

impl FakeCompletion {
    fn new(dialogue: Value) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            dialogue,
        }
    }
}

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn complete(&self, _system: &str, user: &str, _temperature: f32) -> Result<String> {
        self.calls.lock().unwrap().push(user.to_string());
        if user.starts_with("Summary:") {
            Ok("Robins are small thrushes...".to_string())
        } else {
            Ok("- robins are birds".to_string())
        }
    }

    async fn complete_structured(
        &self,
        _system: &str,
        user: &str,
        _temperature: f32,
        _shape: &ResponseShape,
    ) -> Result<Value> {
        self.calls.lock().unwrap().push(user.to_string());
        Ok(self.dialogue.clone())
    }
}

/// One second of constant PCM per line; Mark is positive, Anna negative.
#[derive(Clone, Default)]
struct FakeSpeech {
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

fn clip(voice_id: &str) -> Vec<u8> {
    let level = if voice_id == "v-mark" { 0.25 } else { -0.25 };
    codec::encode_pcm_s16le(&vec![level; RATE as usize])
}

#[async_trait]
impl SpeechProvider for FakeSpeech {
    async fn synthesize(&self, text: &str, voice_id: &str, _settings: &VoiceSettings) -> Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((voice_id.to_string(), text.to_string()));
        Ok(clip(voice_id))
    }
}

#[derive(Clone)]
struct FakeGenerator {
    model: &'static str,
    calls: Arc<Mutex<usize>>,
}

impl FakeGenerator {
    fn new(model: &'static str) -> Self {
        Self {
            model,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl AudioGenerator for FakeGenerator {
    fn model_id(&self) -> &str {
        self.model
    }

    async fn generate(&self, prompts: &[String], duration_secs: u32) -> Result<Vec<AudioBuffer>> {
        *self.calls.lock().unwrap() += 1;
        Ok(prompts
            .iter()
            .map(|_| AudioBuffer::new(vec![0.05; RATE as usize * duration_secs as usize], RATE))
            .collect())
    }
}

struct FakeImages;

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<u8>> {
        assert!(request.prompt.contains("Robin"));
        Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }
}

fn config(root: &Path) -> Config {
    let mut config = Config::default();
    config.ambient.directory = root.join("audios");
    config.paths.episodes_dir = root.join("audios/episodes");
    config.paths.full_episodes_dir = root.join("audios/full_episodes");
    config.cover.directory = root.join("covers");
    config.voices.format = VoiceFormat::Pcm { sample_rate: RATE };
    config.voices.speakers.insert("Mark".to_string(), "v-mark".to_string());
    config.voices.speakers.insert("Anna".to_string(), "v-anna".to_string());
    config.mix.export_sample_rate = RATE;
    config
}

fn robin_dialogue() -> Value {
    json!({
        "podcast_dialogues": [
            {"speaker_name": "Mark", "speaker_text": "Hey Anna!"},
            {"speaker_name": "Anna", "speaker_text": "Hi Mark!"}
        ]
    })
}

struct Fakes {
    completion: FakeCompletion,
    speech: FakeSpeech,
    music: FakeGenerator,
    effects: FakeGenerator,
}

fn pipeline(config: Config, dialogue: Value, ambiguous: bool) -> (PodcastPipeline, Fakes) {
    let fakes = Fakes {
        completion: FakeCompletion::new(dialogue),
        speech: FakeSpeech::default(),
        music: FakeGenerator::new("musicgen"),
        effects: FakeGenerator::new("audiogen"),
    };
    let providers = Providers {
        text: Box::new(FakeWiki { ambiguous }),
        completion: Box::new(fakes.completion.clone()),
        speech: Box::new(fakes.speech.clone()),
        music: Box::new(fakes.music.clone()),
        effects: Box::new(fakes.effects.clone()),
        images: Some(Box::new(FakeImages)),
    };
    (PodcastPipeline::new(config, providers).unwrap(), fakes)
}

#[tokio::test]
async fn test_robin_episode_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let (pipeline, fakes) = pipeline(config.clone(), robin_dialogue(), false);

    let stages = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&stages);
    let pipeline = pipeline.with_callback(Box::new(move |event| {
        if let PipelineEvent::StageStart { stage } = event {
            seen.lock().unwrap().push(stage);
        }
    }));

    let report = pipeline
        .run("Robin", "robin", &RunOptions::default())
        .await
        .unwrap();

    // Map calls, one reduce, then the structured dialogue call.
    let calls = fakes.completion.calls.lock().unwrap().clone();
    assert_eq!(calls.iter().filter(|c| c.starts_with("Summary:")).count(), 1);
    assert_eq!(calls.last().unwrap(), "Robins are small thrushes...");

    assert_eq!(
        *fakes.speech.calls.lock().unwrap(),
        vec![
            ("v-mark".to_string(), "Hey Anna!".to_string()),
            ("v-anna".to_string(), "Hi Mark!".to_string()),
        ]
    );
    let mut expected_track = clip("v-mark");
    expected_track.extend(clip("v-anna"));
    assert_eq!(std::fs::read(&report.voice_track_path).unwrap(), expected_track);

    assert_eq!(report.ambient.generator_calls, 2);
    assert_eq!(report.ambient.music, CacheOutcome::Generated);

    // 15 s bed plus the 5 s effect crossfaded over 1.5 s, the voices, the bed again.
    assert!((report.intro_secs - 18.5).abs() < 0.01);
    assert!((report.voice_secs - 2.0).abs() < 0.01);
    assert!((report.outro_secs - 15.0).abs() < 0.01);
    assert!((report.duration_secs - (report.intro_secs + report.voice_secs + report.outro_secs)).abs() < 0.001);

    let exported = codec::decode_file(&report.episode_path).unwrap();
    assert!((exported.duration_secs() - report.duration_secs).abs() < 0.01);

    let saved: Value = serde_json::from_slice(&std::fs::read(&report.script_path).unwrap()).unwrap();
    assert_eq!(saved, robin_dialogue());
    assert!(report.cover_path.unwrap().is_file());

    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            Stage::TextAcquisition,
            Stage::Chunking,
            Stage::Summarization,
            Stage::DialogueSynthesis,
            Stage::VoiceRendering,
            Stage::AmbientAssets,
            Stage::AudioAssembly,
            Stage::CoverGeneration,
        ]
    );
}

#[tokio::test]
async fn test_present_ambient_assets_are_not_regenerated() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    codec::write_wav(&config.ambient.music_path(), &AudioBuffer::new(vec![0.1; RATE as usize * 20], RATE)).unwrap();
    codec::write_wav(&config.ambient.effect_path(), &AudioBuffer::new(vec![0.1; RATE as usize * 5], RATE)).unwrap();

    let (pipeline, fakes) = pipeline(config, robin_dialogue(), false);
    let options = RunOptions {
        skip_cover: true,
        ..Default::default()
    };
    let report = pipeline.run("Robin", "robin", &options).await.unwrap();

    assert_eq!(report.ambient.generator_calls, 0);
    assert_eq!(fakes.music.calls() + fakes.effects.calls(), 0);
    assert!(report.episode_path.is_file());
    assert!(report.cover_path.is_none());
}

#[tokio::test]
async fn test_max_lines_truncates_before_rendering() {
    let dir = TempDir::new().unwrap();
    let (pipeline, fakes) = pipeline(config(dir.path()), robin_dialogue(), false);
    let options = RunOptions {
        max_lines: Some(1),
        skip_cover: true,
    };

    let report = pipeline.run("Robin", "robin", &options).await.unwrap();

    assert_eq!(report.script.len(), 1);
    assert_eq!(fakes.speech.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_schema_violation_stops_before_voices() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let bad = json!({"dialogues": [{"speaker_name": "Mark", "speaker_text": "Hi"}]});
    let (pipeline, fakes) = pipeline(config.clone(), bad, false);

    let err = pipeline
        .run("Robin", "robin", &RunOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::DialogueSynthesis);
    assert!(matches!(err.source, PodcastError::SchemaViolation(_)));
    assert!(err.to_string().starts_with("[dialogue-synthesis]"));
    assert!(fakes.speech.calls.lock().unwrap().is_empty());
    assert!(!config.voice_track_path("robin").exists());
}

#[tokio::test]
async fn test_empty_dialogue_fails_at_synthesis() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let (pipeline, fakes) = pipeline(config.clone(), json!({"podcast_dialogues": []}), false);

    let err = pipeline
        .run("Robin", "robin", &RunOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::DialogueSynthesis);
    assert!(matches!(err.source, PodcastError::SchemaViolation(_)));
    assert!(fakes.speech.calls.lock().unwrap().is_empty());
    assert!(!config.voice_track_path("robin").exists());
}

#[tokio::test]
async fn test_ambiguous_topic_fails_at_acquisition() {
    let dir = TempDir::new().unwrap();
    let (pipeline, fakes) = pipeline(config(dir.path()), robin_dialogue(), true);

    let err = pipeline
        .run("Mercury", "mercury", &RunOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::TextAcquisition);
    assert!(fakes.completion.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_dialogue_from_text() {
    let dir = TempDir::new().unwrap();
    let (pipeline, _fakes) = pipeline(config(dir.path()), robin_dialogue(), false);

    let script = pipeline
        .create_dialogue("Robins are small thrushes.")
        .await
        .unwrap();

    assert_eq!(script.len(), 2);
    assert_eq!(script.lines()[0].speaker_text, "Hey Anna!");
}
