//! PodcastAI CLI - AI Podcast Generator
//!
//! A command-line tool that turns a Wikipedia page into a two-host podcast episode.

use clap::Parser;
use colored::Colorize;
use podcastai_core::providers::{
    ElevenLabsClient, HuggingFaceAudio, HuggingFaceImages, OpenAiCompletion, WikipediaClient,
};
use podcastai_core::{
    Config, Credentials, ImageGenerator, PipelineEvent, PodcastPipeline, Providers, RunOptions,
    SpeechProvider, Speaker, default_config,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "podcastai",
    version,
    about = "AI Podcast Generator - Two hosts talk about any Wikipedia page",
    long_about = "A CLI tool that summarizes a Wikipedia page, writes a dialogue between two hosts, voices it and mixes it with an intro into a full episode. HF_TOKEN is only needed when an intro bed is missing or the cover is rendered."
)]
struct Cli {
    /// Name of the Wikipedia page the episode is about
    #[arg(short, long, default_value = "Common Blackbird", value_name = "PAGE")]
    pagename: String,

    /// Slug used in every output file name (lowercase letters, digits, '_' and '-')
    #[arg(short = 's', long, default_value = "common_blackbird", value_name = "SLUG", value_parser = parse_slug)]
    episodeslug: String,

    /// TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Voice only the first N lines of the script
    #[arg(long, value_name = "N", value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    max_lines: Option<usize>,

    /// Do not render the cover image
    #[arg(long)]
    skip_cover: bool,

    /// Use the offline kokoro voices instead of ElevenLabs
    #[cfg(feature = "local-tts")]
    #[arg(long)]
    local_tts: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_slug(value: &str) -> Result<String, String> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid {
        Ok(value.to_string())
    } else {
        Err(format!(
            "'{}' is not a valid slug; use lowercase letters, digits, '_' or '-'",
            value
        ))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Read API credentials from the environment.
fn credentials_from_env() -> Credentials {
    Credentials {
        openai_api_key: env::var("OPENAI_API_KEY").ok(),
        openai_api_base: env::var("OPENAI_API_BASE")
            .or_else(|_| env::var("OPENAI_BASE_URL"))
            .ok(),
        elevenlabs_api_key: env::var("ELEVENLABS_API_KEY").ok(),
        huggingface_token: env::var("HF_TOKEN")
            .or_else(|_| env::var("HUGGINGFACE_TOKEN"))
            .ok(),
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    #[allow(unused_mut)]
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };
    let credentials = credentials_from_env();
    let network = config.network.clone();

    #[cfg(feature = "local-tts")]
    let speech: Box<dyn SpeechProvider> = if cli.local_tts {
        use podcastai_core::providers::KokoroSpeech;
        config.voices.format = KokoroSpeech::voice_format();
        config.voices.speakers = config.voices.local_speakers.clone();
        Box::new(KokoroSpeech::new().await?)
    } else {
        Box::new(ElevenLabsClient::new(&credentials, &config.voices, &network)?)
    };
    #[cfg(not(feature = "local-tts"))]
    let speech: Box<dyn SpeechProvider> =
        Box::new(ElevenLabsClient::new(&credentials, &config.voices, &network)?);

    let images: Option<Box<dyn ImageGenerator>> = if cli.skip_cover {
        None
    } else {
        Some(Box::new(HuggingFaceImages::new(
            &credentials,
            &network,
            config.cover.base_model.clone(),
            config.cover.refiner_model.clone(),
        )?))
    };

    let providers = Providers {
        text: Box::new(WikipediaClient::new(&network)?),
        completion: Box::new(OpenAiCompletion::new(
            &credentials,
            config.models.completion_model.clone(),
            &network,
        )?),
        speech,
        music: Box::new(HuggingFaceAudio::new(
            &credentials,
            &network,
            config.ambient.music_model.clone(),
            config.ambient.top_k,
        )?),
        effects: Box::new(HuggingFaceAudio::new(
            &credentials,
            &network,
            config.ambient.effect_model.clone(),
            config.ambient.top_k,
        )?),
        images,
    };

    // Print header
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - {}", "PodcastAI".bold(), config.podcast.name)
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Page:".bold(), cli.pagename.bright_white());
    println!("{} {}", "Episode:".bold(), cli.episodeslug.bright_white());
    println!("{} {}", "Model:".bold(), config.models.completion_model.dimmed());
    println!();
    println!("{}", "─".repeat(70).dimmed());

    let options = RunOptions {
        max_lines: cli.max_lines,
        skip_cover: cli.skip_cover,
    };
    let pipeline = PodcastPipeline::new(config, providers)?.with_callback(create_console_callback());
    let report = pipeline.run(&cli.pagename, &cli.episodeslug, &options).await?;

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Episode ready.".bright_green().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "  {} {} ({:.1} s: intro {:.1} s, voices {:.1} s, outro {:.1} s)",
        "Episode:".bold(),
        report.episode_path.display(),
        report.duration_secs,
        report.intro_secs,
        report.voice_secs,
        report.outro_secs
    );
    println!("  {} {}", "Voices:".bold(), report.voice_track_path.display());
    println!("  {} {}", "Script:".bold(), report.script_path.display());
    if let Some(cover) = &report.cover_path {
        println!("  {} {}", "Cover:".bold(), cover.display());
    }
    if report.oversized_chunks > 0 {
        println!(
            "  {}",
            format!(
                "{} of {} chunks exceeded the token budget",
                report.oversized_chunks, report.chunk_count
            )
            .yellow()
        );
    }
    println!();

    Ok(())
}

/// Create a callback that prints pipeline events to the console.
fn create_console_callback() -> Box<dyn Fn(PipelineEvent) + Send + Sync> {
    Box::new(move |event| match event {
        PipelineEvent::StageStart { stage } => {
            println!("{} {}", "▶".bright_cyan(), stage.name().bright_cyan().bold());
        }
        PipelineEvent::StageDone { stage: _, detail } => {
            println!("  {} {}", "✓".bright_green(), detail.dimmed());
        }
        PipelineEvent::DialogueLine { speaker, text } => {
            let name = match speaker {
                Speaker::Mark => speaker.as_str().bright_magenta().bold(),
                Speaker::Anna => speaker.as_str().yellow().bold(),
            };
            println!("  {}", name);
            for line in textwrap(&text, 64).lines() {
                println!("    {}", line);
            }
        }
        PipelineEvent::EpisodeEnd => {
            // Handled in run
        }
    })
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}
