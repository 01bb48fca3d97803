//! Decoding and encoding of audio files.
//!
//! Compressed or containerised audio (MP3, WAV, FLAC, OGG) goes through
//! symphonia; raw PCM and the final WAV export are handled directly.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::audio::AudioBuffer;
use crate::error::{PodcastError, Result};

/// Decode an audio file, down-mixing to mono.
pub fn decode_file(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(PodcastError::MissingAsset {
            path: path.to_path_buf(),
        });
    }

    let file = fs::File::open(path)?;
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let buffer = decode_source(Box::new(file), hint)?;
    debug!(
        path = %path.display(),
        sample_rate = buffer.sample_rate(),
        duration_ms = buffer.duration_ms(),
        "decoded audio file"
    );
    Ok(buffer)
}

/// Decode in-memory audio, using an optional MIME type or extension as a probe hint.
pub fn decode_bytes(bytes: Vec<u8>, hint_type: Option<&str>) -> Result<AudioBuffer> {
    let mut hint = Hint::new();
    if let Some(kind) = hint_type {
        if kind.contains('/') {
            hint.mime_type(kind);
        } else {
            hint.with_extension(kind);
        }
    }
    decode_source(Box::new(Cursor::new(bytes)), hint)
}

fn decode_source(source: Box<dyn MediaSource>, hint: Hint) -> Result<AudioBuffer> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| PodcastError::Audio(format!("Unrecognised audio container: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| PodcastError::Audio("No supported audio tracks found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PodcastError::Audio(format!("Unsupported codec: {}", e)))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    let mut mono = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(PodcastError::Audio(format!("Failed to read packet: {}", e))),
        };

        while !format.metadata().is_latest() {
            format.metadata().pop();
        }

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt frames are skipped, the rest of the stream is still usable.
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("skipping undecodable frame: {}", e);
                continue;
            }
            Err(e) => return Err(PodcastError::Audio(format!("Decode failed: {}", e))),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        let channels = spec.channels.count().max(1);

        let mut interleaved = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        interleaved.copy_interleaved_ref(decoded);
        mono.extend(
            interleaved
                .samples()
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }

    if sample_rate == 0 {
        return Err(PodcastError::Audio("Audio stream has no sample rate".to_string()));
    }

    Ok(AudioBuffer::new(mono, sample_rate))
}

/// Interpret headerless 16-bit little-endian mono PCM.
pub fn decode_pcm_s16le(bytes: &[u8], sample_rate: u32) -> AudioBuffer {
    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / i16::MAX as f32)
        .collect();
    AudioBuffer::new(samples, sample_rate)
}

/// Encode samples as headerless 16-bit little-endian PCM.
pub fn encode_pcm_s16le(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|s| to_i16(*s).to_le_bytes())
        .collect()
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Encode a buffer as a 16-bit mono WAV file in memory.
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| PodcastError::Audio(format!("Failed to start WAV: {}", e)))?;
        for sample in buffer.samples() {
            writer
                .write_sample(to_i16(*sample))
                .map_err(|e| PodcastError::Audio(format!("Failed to write WAV sample: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| PodcastError::Audio(format!("Failed to finalize WAV: {}", e)))?;
    }
    Ok(cursor.into_inner())
}

/// Write a buffer to `path` as WAV, atomically.
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<()> {
    let bytes = encode_wav(buffer)?;
    write_atomic(path, &bytes)
}

/// Write `bytes` to a temporary file beside `path`, then rename it into place.
///
/// Readers never observe a partially written file at `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| PodcastError::Io(e.error))?;

    debug!(path = %path.display(), bytes = bytes.len(), "wrote file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tone(len: usize, rate: u32) -> AudioBuffer {
        let samples = (0..len)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        AudioBuffer::new(samples, rate)
    }

    #[test]
    fn test_wav_write_then_decode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tone.wav");
        let buffer = tone(3200, 16_000);

        write_wav(&path, &buffer).unwrap();
        let decoded = decode_file(&path).unwrap();

        assert_eq!(decoded.sample_rate(), 16_000);
        assert_eq!(decoded.len(), 3200);
        assert!((decoded.samples()[100] - buffer.samples()[100]).abs() < 1e-3);
    }

    #[test]
    fn test_decode_wav_bytes_with_mime_hint() {
        let bytes = encode_wav(&tone(800, 8_000)).unwrap();
        let decoded = decode_bytes(bytes, Some("audio/wav")).unwrap();
        assert_eq!(decoded.len(), 800);
        assert_eq!(decoded.sample_rate(), 8_000);
    }

    #[test]
    fn test_stereo_wav_is_downmixed() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..100 {
                writer.write_sample(i16::MAX / 2).unwrap();
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }

        let decoded = decode_bytes(cursor.into_inner(), Some("wav")).unwrap();
        assert_eq!(decoded.len(), 100);
        assert!((decoded.samples()[0] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_missing_file_is_missing_asset() {
        let err = decode_file(Path::new("/nonexistent/intro.wav")).unwrap_err();
        assert!(matches!(err, PodcastError::MissingAsset { .. }));
    }

    #[test]
    fn test_pcm_encode_decode() {
        let bytes = encode_pcm_s16le(&[0.0, 0.5, -0.5, 2.0]);
        assert_eq!(bytes.len(), 8);
        let decoded = decode_pcm_s16le(&bytes, 24_000);
        assert_eq!(decoded.len(), 4);
        assert!((decoded.samples()[1] - 0.5).abs() < 1e-3);
        assert!((decoded.samples()[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_write_atomic_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.bin");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
