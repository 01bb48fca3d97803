//! Mono audio buffer and the pure transforms the episode mix is built from.
//!
//! Every transform borrows its inputs and returns a new buffer. Lengths are
//! tracked in samples; millisecond arguments are converted at the buffer's
//! own sample rate.

use crate::error::{PodcastError, Result};

/// Gain treated as silence at the start of a fade in (and end of a fade out).
pub const SILENCE_DB: f32 = -120.0;

/// Convert a gain in decibels to a linear amplitude factor.
pub fn db_to_amplitude(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Options for [`AudioBuffer::overlay`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayOptions {
    /// Where the first repetition of the layer starts in the base.
    pub position_ms: u64,
    /// How many times the layer is laid back to back. Repetitions never extend
    /// past the end of the base; the last one is cut short if needed.
    pub times: usize,
    /// Gain applied to the layer before mixing.
    pub gain_db: f32,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            position_ms: 0,
            times: 1,
            gain_db: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn silent(duration_ms: u64, sample_rate: u32) -> Self {
        let len = ms_to_samples(duration_ms, sample_rate);
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in whole milliseconds (rounded down).
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    fn samples_for(&self, ms: u64) -> usize {
        ms_to_samples(ms, self.sample_rate)
    }

    /// The part between `start_ms` and `end_ms`, clamped to the buffer.
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> AudioBuffer {
        let start = self.samples_for(start_ms).min(self.len());
        let end = self.samples_for(end_ms).clamp(start, self.len());
        AudioBuffer::new(self.samples[start..end].to_vec(), self.sample_rate)
    }

    /// The first `duration_ms` of the buffer (the whole buffer if shorter).
    pub fn truncate_ms(&self, duration_ms: u64) -> AudioBuffer {
        self.slice_ms(0, duration_ms)
    }

    pub fn apply_gain(&self, db: f32) -> AudioBuffer {
        let factor = db_to_amplitude(db);
        AudioBuffer::new(
            self.samples.iter().map(|s| s * factor).collect(),
            self.sample_rate,
        )
    }

    /// Ramp from silence to full level over the first `duration_ms`.
    ///
    /// The gain factor rises linearly in amplitude from [`SILENCE_DB`] to 1.0,
    /// so a fade in and a fade out of equal length sum to a constant level.
    pub fn fade_in(&self, duration_ms: u64) -> AudioBuffer {
        let fade_len = self.samples_for(duration_ms).min(self.len());
        let mut samples = self.samples.clone();
        for (i, sample) in samples.iter_mut().take(fade_len).enumerate() {
            *sample *= fade_gain(i as f32 / fade_len as f32);
        }
        AudioBuffer::new(samples, self.sample_rate)
    }

    /// Ramp from full level to silence over the last `duration_ms`.
    pub fn fade_out(&self, duration_ms: u64) -> AudioBuffer {
        let fade_len = self.samples_for(duration_ms).min(self.len());
        let start = self.len() - fade_len;
        let mut samples = self.samples.clone();
        for (i, sample) in samples.iter_mut().skip(start).enumerate() {
            *sample *= fade_gain(1.0 - i as f32 / fade_len as f32);
        }
        AudioBuffer::new(samples, self.sample_rate)
    }

    /// Mix `layer` on top of this buffer. The result keeps this buffer's length.
    pub fn overlay(&self, layer: &AudioBuffer, options: OverlayOptions) -> Result<AudioBuffer> {
        self.ensure_same_rate(layer, "overlay")?;

        let mut samples = self.samples.clone();
        if layer.is_empty() {
            return Ok(AudioBuffer::new(samples, self.sample_rate));
        }

        let factor = db_to_amplitude(options.gain_db);
        let mut pos = self.samples_for(options.position_ms).min(samples.len());
        for _ in 0..options.times {
            if pos >= samples.len() {
                break;
            }
            let take = layer.len().min(samples.len() - pos);
            for (dst, src) in samples[pos..pos + take].iter_mut().zip(&layer.samples) {
                *dst += src * factor;
            }
            pos += take;
        }

        Ok(AudioBuffer::new(samples, self.sample_rate))
    }

    /// Append `next`, blending the last `crossfade_ms` of this buffer with the
    /// first `crossfade_ms` of `next`.
    ///
    /// The result is `len(self) + len(next) - crossfade` long. A crossfade
    /// longer than either side is an error.
    pub fn append_crossfade(&self, next: &AudioBuffer, crossfade_ms: u64) -> Result<AudioBuffer> {
        self.ensure_same_rate(next, "crossfade")?;

        let xf = self.samples_for(crossfade_ms);
        if xf == 0 {
            return self.concat(next);
        }
        if xf > self.len() {
            return Err(PodcastError::Audio(format!(
                "crossfade of {} ms is longer than the leading segment ({} ms)",
                crossfade_ms,
                self.duration_ms()
            )));
        }
        if xf > next.len() {
            return Err(PodcastError::Audio(format!(
                "crossfade of {} ms is longer than the appended segment ({} ms)",
                crossfade_ms,
                next.duration_ms()
            )));
        }

        let head_len = self.len() - xf;
        let tail = AudioBuffer::new(self.samples[head_len..].to_vec(), self.sample_rate).fade_out(crossfade_ms);
        let lead = AudioBuffer::new(next.samples[..xf].to_vec(), self.sample_rate).fade_in(crossfade_ms);

        let mut samples = Vec::with_capacity(self.len() + next.len() - xf);
        samples.extend_from_slice(&self.samples[..head_len]);
        samples.extend(tail.samples.iter().zip(&lead.samples).map(|(a, b)| a + b));
        samples.extend_from_slice(&next.samples[xf..]);

        Ok(AudioBuffer::new(samples, self.sample_rate))
    }

    /// Hard-cut concatenation.
    pub fn concat(&self, next: &AudioBuffer) -> Result<AudioBuffer> {
        self.ensure_same_rate(next, "concat")?;
        let mut samples = Vec::with_capacity(self.len() + next.len());
        samples.extend_from_slice(&self.samples);
        samples.extend_from_slice(&next.samples);
        Ok(AudioBuffer::new(samples, self.sample_rate))
    }

    /// Resample with linear interpolation.
    pub fn resample(&self, to_rate: u32) -> AudioBuffer {
        if self.sample_rate == to_rate || self.is_empty() || self.sample_rate == 0 {
            return AudioBuffer::new(self.samples.clone(), to_rate);
        }

        let ratio = self.sample_rate as f64 / to_rate as f64;
        let output_len = (self.samples.len() as f64 / ratio).round() as usize;

        let samples = (0..output_len)
            .map(|i| {
                let source_pos = i as f64 * ratio;
                let source_idx = source_pos.floor() as usize;
                let fraction = (source_pos - source_idx as f64) as f32;

                if source_idx + 1 >= self.samples.len() {
                    self.samples[self.samples.len() - 1]
                } else {
                    let left = self.samples[source_idx];
                    let right = self.samples[source_idx + 1];
                    left + (right - left) * fraction
                }
            })
            .collect();

        AudioBuffer::new(samples, to_rate)
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    fn ensure_same_rate(&self, other: &AudioBuffer, op: &str) -> Result<()> {
        if self.sample_rate != other.sample_rate {
            return Err(PodcastError::Audio(format!(
                "{} needs matching sample rates, got {} Hz and {} Hz",
                op, self.sample_rate, other.sample_rate
            )));
        }
        Ok(())
    }
}

/// Linear gain factor at `progress` (0.0 silent, 1.0 full) through a fade.
fn fade_gain(progress: f32) -> f32 {
    let floor = db_to_amplitude(SILENCE_DB);
    floor + (1.0 - floor) * progress.clamp(0.0, 1.0)
}

pub fn ms_to_samples(ms: u64, sample_rate: u32) -> usize {
    (ms * sample_rate as u64 / 1000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ones(ms: u64, rate: u32) -> AudioBuffer {
        AudioBuffer::new(vec![1.0; ms_to_samples(ms, rate)], rate)
    }

    #[test]
    fn test_duration_ms() {
        let buf = ones(1500, 1000);
        assert_eq!(buf.len(), 1500);
        assert_eq!(buf.duration_ms(), 1500);
        assert!((buf.duration_secs() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_truncate_longer_than_buffer_keeps_all() {
        let buf = ones(200, 1000);
        assert_eq!(buf.truncate_ms(15_000).len(), 200);
        assert_eq!(buf.truncate_ms(50).len(), 50);
    }

    #[test]
    fn test_gain_is_non_destructive() {
        let buf = ones(10, 1000);
        let louder = buf.apply_gain(6.0);
        assert_eq!(buf.samples()[0], 1.0);
        assert!((louder.samples()[0] - 1.9953).abs() < 1e-3);
    }

    #[test]
    fn test_fade_in_starts_silent_and_ends_full() {
        let buf = ones(2000, 1000);
        let faded = buf.fade_in(1000);
        assert_eq!(faded.len(), buf.len());
        assert!(faded.samples()[0] < 1e-5);
        assert!(faded.samples()[500] < faded.samples()[900]);
        assert_eq!(faded.samples()[1000], 1.0);
        assert_eq!(faded.samples()[1999], 1.0);
    }

    #[test]
    fn test_fade_out_ends_silent() {
        let faded = ones(1000, 1000).fade_out(500);
        assert_eq!(faded.samples()[499], 1.0);
        assert!(faded.samples()[999] < 1e-2);
    }

    #[test]
    fn test_fade_ramps_linearly_in_amplitude() {
        let faded_in = ones(2000, 1000).fade_in(1000);
        assert!((faded_in.samples()[500] - 0.5).abs() < 1e-3);
        assert!((faded_in.samples()[800] - 0.8).abs() < 1e-3);

        let faded_out = ones(1000, 1000).fade_out(1000);
        assert!((faded_out.samples()[250] - 0.75).abs() < 1e-3);
        assert!((faded_out.samples()[500] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_overlay_keeps_base_length_and_stops_at_end() {
        let base = AudioBuffer::new(vec![0.0; 12], 1000);
        let layer = AudioBuffer::new(vec![1.0; 5], 1000);
        let mixed = base
            .overlay(&layer, OverlayOptions { times: 5, ..Default::default() })
            .unwrap();
        assert_eq!(mixed.len(), 12);
        assert!(mixed.samples().iter().all(|s| *s == 1.0));
    }

    #[test]
    fn test_overlay_times_limits_repetitions() {
        let base = AudioBuffer::new(vec![0.0; 20], 1000);
        let layer = AudioBuffer::new(vec![1.0; 5], 1000);
        let mixed = base
            .overlay(&layer, OverlayOptions { times: 2, ..Default::default() })
            .unwrap();
        assert_eq!(mixed.samples()[9], 1.0);
        assert_eq!(mixed.samples()[10], 0.0);
    }

    #[test]
    fn test_overlay_applies_layer_gain() {
        let base = AudioBuffer::new(vec![0.5; 4], 1000);
        let layer = AudioBuffer::new(vec![0.1; 4], 1000);
        let mixed = base
            .overlay(&layer, OverlayOptions { gain_db: 20.0, ..Default::default() })
            .unwrap();
        assert!((mixed.samples()[0] - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_overlay_rejects_rate_mismatch() {
        let base = ones(10, 1000);
        let layer = ones(10, 2000);
        assert!(base.overlay(&layer, OverlayOptions::default()).is_err());
    }

    #[test]
    fn test_crossfade_length() {
        let a = ones(3000, 1000);
        let b = ones(2000, 1000);
        let joined = a.append_crossfade(&b, 1500).unwrap();
        assert_eq!(joined.len(), 3000 + 2000 - 1500);
        // Outside the blend region the inputs pass through untouched.
        assert_eq!(joined.samples()[0], 1.0);
        assert_eq!(joined.samples()[joined.len() - 1], 1.0);
    }

    #[test]
    fn test_crossfade_keeps_level_through_blend() {
        let a = ones(3000, 1000);
        let b = ones(2000, 1000);
        let joined = a.append_crossfade(&b, 1500).unwrap();
        // The blend spans samples 1500..3000.
        for at in [1500, 1875, 2250, 2625, 2999] {
            assert!((joined.samples()[at] - 1.0).abs() < 1e-3, "level dipped at {}", at);
        }
    }

    #[test]
    fn test_crossfade_longer_than_segment_fails() {
        let a = ones(1000, 1000);
        let b = ones(3000, 1000);
        assert!(a.append_crossfade(&b, 1500).is_err());
        assert!(b.append_crossfade(&a, 1500).is_err());
    }

    #[test]
    fn test_resample_length() {
        let buf = ones(1000, 16_000);
        let up = buf.resample(44_100);
        assert_eq!(up.sample_rate(), 44_100);
        assert_eq!(up.len(), 44_100);
        assert!(up.samples().iter().all(|s| (*s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_concat() {
        let joined = ones(10, 1000).concat(&ones(5, 1000)).unwrap();
        assert_eq!(joined.len(), 15);
    }
}
