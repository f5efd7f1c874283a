//! Windowed RMS loudness envelope in decibels.
//!
//! ## Algorithm
//!
//! 1. Slice the waveform into windows of `frame_length` samples starting every
//!    `hop_length` samples (no padding; a signal shorter than one window is a
//!    single window over the whole signal).
//! 2. Compute the RMS of each window.
//! 3. Convert to dB relative to the loudest window:
//!    `20·log10(max(rms / peak, ε))`, floored at [`DB_FLOOR`].
//!
//! The loudest window is therefore always 0 dB and every value is finite.

use serde::{Deserialize, Serialize};

use crate::{
    audio::Waveform,
    error::{Result, VeditError},
    timing::FrameClock,
};

/// Floor sentinel for silent windows (and for every window of a silent signal).
pub const DB_FLOOR: f32 = -120.0;

/// Window geometry for envelope computation.
///
/// Both lengths are positive; `hop_length ≤ frame_length` is typical but not
/// required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeConfig {
    frame_length: usize,
    hop_length: usize,
}

impl EnvelopeConfig {
    /// # Errors
    /// `InvalidConfiguration` when either length is zero.
    pub fn new(frame_length: usize, hop_length: usize) -> Result<Self> {
        if frame_length == 0 || hop_length == 0 {
            return Err(VeditError::config(format!(
                "frame_length and hop_length must be positive (got {frame_length}/{hop_length})"
            )));
        }
        Ok(Self {
            frame_length,
            hop_length,
        })
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Number of frames produced for a signal of `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        match len {
            0 => 0,
            n if n < self.frame_length => 1,
            n => (n - self.frame_length) / self.hop_length + 1,
        }
    }
}

/// Named analysis resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "profile")]
pub enum FrameProfile {
    /// 2048 / 512: display and editor preview.
    Overview,
    /// 1024 / 256: silence diagnostics.
    Diagnostics,
    /// 256 / 64: precise cut-point detection.
    CutPoint,
    #[serde(rename_all = "camelCase")]
    Custom {
        frame_length: usize,
        hop_length: usize,
    },
}

impl FrameProfile {
    /// # Errors
    /// `InvalidConfiguration` for a `Custom` profile with a zero length.
    pub fn envelope_config(self) -> Result<EnvelopeConfig> {
        match self {
            FrameProfile::Overview => EnvelopeConfig::new(2048, 512),
            FrameProfile::Diagnostics => EnvelopeConfig::new(1024, 256),
            FrameProfile::CutPoint => EnvelopeConfig::new(256, 64),
            FrameProfile::Custom {
                frame_length,
                hop_length,
            } => EnvelopeConfig::new(frame_length, hop_length),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FrameProfile::Overview => "overview",
            FrameProfile::Diagnostics => "diagnostics",
            FrameProfile::CutPoint => "cut-point",
            FrameProfile::Custom { .. } => "custom",
        }
    }
}

/// Per-frame loudness in dB, aligned 1:1 with frame index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    values: Vec<f32>,
    frame_length: usize,
    hop_length: usize,
    sample_rate: u32,
    /// Length of the source waveform in samples.
    sample_count: usize,
}

impl Envelope {
    /// Compute the envelope of `waveform`. Empty input yields an empty envelope.
    pub fn compute(waveform: &Waveform, config: EnvelopeConfig) -> Self {
        let rms = frame_rms(&waveform.samples, config);
        let values = rms_to_db(&rms);

        Self {
            values,
            frame_length: config.frame_length,
            hop_length: config.hop_length,
            sample_rate: waveform.sample_rate,
            sample_count: waveform.samples.len(),
        }
    }

    /// Wrap precomputed dB values, e.g. from an external analyser.
    pub fn from_values(
        values: Vec<f32>,
        config: EnvelopeConfig,
        sample_rate: u32,
        sample_count: usize,
    ) -> Self {
        Self {
            values,
            frame_length: config.frame_length,
            hop_length: config.hop_length,
            sample_rate,
            sample_count,
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Duration of the source waveform in seconds.
    pub fn source_duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.sample_count as f64 / self.sample_rate as f64
    }

    /// Frame ↔ time mapping for this envelope.
    ///
    /// # Errors
    /// `InvalidConfiguration` when the source sample rate is zero.
    pub fn clock(&self) -> Result<FrameClock> {
        FrameClock::new(self.sample_rate, self.hop_length)
    }
}

/// RMS of a sample slice, accumulated in f64.
pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

fn frame_rms(samples: &[f32], config: EnvelopeConfig) -> Vec<f64> {
    let n = config.frame_count(samples.len());
    if n == 1 && samples.len() < config.frame_length {
        return vec![rms(samples)];
    }
    (0..n)
        .map(|i| {
            let start = i * config.hop_length;
            rms(&samples[start..start + config.frame_length])
        })
        .collect()
}

fn rms_to_db(rms: &[f64]) -> Vec<f32> {
    let peak = rms.iter().copied().fold(0.0f64, f64::max);
    if peak <= 0.0 {
        return vec![DB_FLOOR; rms.len()];
    }

    let min_ratio = 10f64.powf(f64::from(DB_FLOOR) / 20.0);
    rms.iter()
        .map(|&r| {
            let db = 20.0 * (r / peak).max(min_ratio).log10();
            (db as f32).max(DB_FLOOR)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn cfg(frame: usize, hop: usize) -> EnvelopeConfig {
        EnvelopeConfig::new(frame, hop).unwrap()
    }

    #[test]
    fn frame_count_follows_stride() {
        let c = cfg(4, 2);
        assert_eq!(c.frame_count(0), 0);
        assert_eq!(c.frame_count(3), 1);
        assert_eq!(c.frame_count(4), 1);
        assert_eq!(c.frame_count(5), 1);
        assert_eq!(c.frame_count(6), 2);
        assert_eq!(c.frame_count(10), 4);
    }

    #[test]
    fn zero_lengths_rejected() {
        assert!(EnvelopeConfig::new(0, 512).unwrap_err().is_invalid_configuration());
        assert!(EnvelopeConfig::new(2048, 0).unwrap_err().is_invalid_configuration());
        let custom = FrameProfile::Custom {
            frame_length: 0,
            hop_length: 1,
        };
        assert!(custom.envelope_config().is_err());
    }

    #[test]
    fn presets_have_expected_geometry() {
        let o = FrameProfile::Overview.envelope_config().unwrap();
        assert_eq!((o.frame_length(), o.hop_length()), (2048, 512));
        let d = FrameProfile::Diagnostics.envelope_config().unwrap();
        assert_eq!((d.frame_length(), d.hop_length()), (1024, 256));
        let c = FrameProfile::CutPoint.envelope_config().unwrap();
        assert_eq!((c.frame_length(), c.hop_length()), (256, 64));
    }

    #[test]
    fn empty_waveform_gives_empty_envelope() {
        let env = Envelope::compute(&Waveform::new(vec![], 44_100), cfg(256, 64));
        assert!(env.is_empty());
    }

    #[test]
    fn all_zero_waveform_is_uniform_floor() {
        let env = Envelope::compute(&Waveform::new(vec![0.0; 4096], 44_100), cfg(256, 64));
        assert_eq!(env.len(), (4096 - 256) / 64 + 1);
        assert!(env.values().iter().all(|v| v.is_finite() && *v == DB_FLOOR));
    }

    #[test]
    fn loudest_frame_is_zero_db() {
        let mut samples = vec![0.1f32; 8];
        samples.extend(vec![0.5f32; 8]);
        let env = Envelope::compute(&Waveform::new(samples, 8), cfg(8, 8));
        assert_eq!(env.len(), 2);
        assert_abs_diff_eq!(env.values()[1], 0.0, epsilon = 1e-6);
        // 0.1 / 0.5 → 20·log10(0.2) ≈ -13.98 dB
        assert_abs_diff_eq!(env.values()[0], -13.979_4, epsilon = 1e-3);
    }

    #[test]
    fn silent_frame_among_loud_is_floored_not_infinite() {
        let mut samples = vec![0.0f32; 4];
        samples.extend(vec![0.3f32; 4]);
        let env = Envelope::compute(&Waveform::new(samples, 8), cfg(4, 4));
        assert_eq!(env.values()[0], DB_FLOOR);
        assert_abs_diff_eq!(env.values()[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn short_signal_is_single_frame() {
        let env = Envelope::compute(&Waveform::new(vec![0.2; 100], 44_100), cfg(2048, 512));
        assert_eq!(env.len(), 1);
        assert_abs_diff_eq!(env.values()[0], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn rms_of_square_wave() {
        let samples: Vec<f32> = (0..256)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        assert_abs_diff_eq!(rms(&samples), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn metadata_is_carried() {
        let env = Envelope::compute(&Waveform::new(vec![0.1; 44_100], 44_100), cfg(1024, 256));
        assert_eq!(env.hop_length(), 256);
        assert_eq!(env.frame_length(), 1024);
        assert_eq!(env.sample_rate(), 44_100);
        assert_eq!(env.sample_count(), 44_100);
        assert_abs_diff_eq!(env.source_duration_secs(), 1.0, epsilon = 1e-12);
    }
}
