//! `WavLoader`: hound-backed loader for PCM and float WAV files.

use std::path::Path;

use tracing::{debug, info};

use super::{downmix_to_mono, resample::RateConverter, LoaderConfig, Waveform, WaveformLoader};
use crate::error::{Result, VeditError};

/// Decodes WAV files, downmixes to mono and resamples to the configured rate.
#[derive(Debug, Clone, Default)]
pub struct WavLoader {
    config: LoaderConfig,
}

impl WavLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    fn read_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
        let decode_err = |e: hound::Error| VeditError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let mut reader = hound::WavReader::open(path).map_err(decode_err)?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(decode_err)?,
            hound::SampleFormat::Int => {
                let bits = u32::from(spec.bits_per_sample.clamp(1, 32));
                let full_scale = (1_i64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full_scale))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(decode_err)?
            }
        };

        debug!(
            path = %path.display(),
            channels,
            sample_rate = spec.sample_rate,
            bits = spec.bits_per_sample,
            "decoded wav"
        );

        Ok((downmix_to_mono(&interleaved, channels), spec.sample_rate))
    }
}

impl WaveformLoader for WavLoader {
    fn load(&self, path: &Path) -> Result<Waveform> {
        let (samples, native_rate) = Self::read_mono(path)?;

        let target = self.config.target_sample_rate.unwrap_or(native_rate);
        let samples = if target == native_rate {
            samples
        } else {
            let mut rc = RateConverter::new(native_rate, target, self.config.resample_chunk)?;
            rc.convert_all(&samples)?
        };

        let waveform = Waveform::new(samples, target);
        info!(
            path = %path.display(),
            native_rate,
            sample_rate = target,
            duration_secs = waveform.duration_secs(),
            "loaded source"
        );
        Ok(waveform)
    }
}
