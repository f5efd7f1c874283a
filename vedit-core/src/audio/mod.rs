//! Waveform type and the loader seam.
//!
//! The engine never decodes audio itself. A `WaveformLoader` turns a file path
//! into a mono `Waveform` at a known sample rate; everything downstream is a
//! pure function of that waveform.

pub mod resample;
pub mod wav;

use std::path::Path;

use crate::error::Result;

/// Analysis rate every source is normalised to before envelope computation.
pub const DEFAULT_ANALYSIS_RATE: u32 = 44_100;

/// A fully-loaded block of mono PCM samples at a known sample rate.
///
/// Immutable once loaded. Share it between jobs as `Arc<Waveform>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Mono f32 samples, nominally in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Duration in seconds; `0.0` for a zero sample rate.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the waveform contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Explicit loader configuration. Nothing is read from process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Resample every source to this rate. `None` keeps the native rate.
    pub target_sample_rate: Option<u32>,
    /// Input block size handed to the resampler per call.
    pub resample_chunk: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: Some(DEFAULT_ANALYSIS_RATE),
            resample_chunk: 1024,
        }
    }
}

/// Contract for audio-loading collaborators.
///
/// Implementations must return mono audio; channel downmixing is theirs.
pub trait WaveformLoader: Send + Sync {
    /// Load and decode `path` into a mono waveform.
    ///
    /// # Errors
    /// `VeditError::Decode` when the file cannot be read as audio.
    fn load(&self, path: &Path) -> Result<Waveform>;
}

/// Average interleaved frames down to one channel.
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().copied().sum::<f32>() / frame.len() as f32)
        .collect()
}
