//! Sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! ## Design
//!
//! Sources arrive at whatever rate they were recorded at (44.1 kHz, 48 kHz,
//! 96 kHz...). Envelope hop sizes are tuned in samples, so the loader brings
//! every file to one analysis rate first and frame timing stays comparable
//! across a batch.
//!
//! When source rate == target rate, `RateConverter` is a passthrough and no
//! rubato session is created at all.
//!
//! ## Usage
//!
//! ```ignore
//! let mut rc = RateConverter::new(48_000, 44_100, 1024)?;
//! let mut out = rc.process(&samples)?;
//! out.extend(rc.finish()?);
//! ```

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use crate::error::{Result, VeditError};

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when source rate == target rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// Partial input chunks carried between calls.
    input_buf: Vec<f32>,
    /// How many input samples rubato expects per process call.
    chunk_size: usize,
    /// Pre-allocated output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
    ratio: f64,
    consumed: usize,
    produced: usize,
}

impl RateConverter {
    /// Create a new converter.
    ///
    /// # Parameters
    /// - `source_rate`: Sample rate of the decoded audio (Hz).
    /// - `target_rate`: Analysis sample rate (Hz).
    /// - `chunk_size`: Input frame count per rubato call (e.g. `1024`).
    ///
    /// # Errors
    /// `VeditError::InvalidConfiguration` for zero rates or chunk size,
    /// `VeditError::Resample` if rubato fails to initialise.
    pub fn new(source_rate: u32, target_rate: u32, chunk_size: usize) -> Result<Self> {
        if source_rate == 0 || target_rate == 0 {
            return Err(VeditError::config(format!(
                "sample rates must be positive (source={source_rate}, target={target_rate})"
            )));
        }
        if chunk_size == 0 {
            return Err(VeditError::config("resample chunk size must be positive"));
        }

        let ratio = target_rate as f64 / source_rate as f64;

        if source_rate == target_rate {
            return Ok(Self {
                resampler: None,
                input_buf: Vec::new(),
                chunk_size,
                output_buf: Vec::new(),
                ratio,
                consumed: 0,
                produced: 0,
            });
        }

        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio
            PolynomialDegree::Cubic,
            chunk_size,
            1, // mono
        )
        .map_err(|e| VeditError::Resample(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        let output_buf = vec![vec![0f32; max_out]; 1];

        debug!(source_rate, target_rate, chunk_size, max_out, "resampling enabled");

        Ok(Self {
            resampler: Some(resampler),
            input_buf: Vec::new(),
            chunk_size,
            output_buf,
            ratio,
            consumed: 0,
            produced: 0,
        })
    }

    /// Process incoming samples, returning resampled output (may be empty).
    ///
    /// Samples are accumulated internally until a full `chunk_size` block is
    /// available for rubato. Any remainder is kept for the next call or for
    /// [`finish`](Self::finish).
    ///
    /// # Errors
    /// `VeditError::Resample` if rubato rejects a block; the output so far is
    /// discarded.
    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        if self.resampler.is_none() {
            return Ok(samples.to_vec());
        }

        self.consumed += samples.len();
        self.input_buf.extend_from_slice(samples);

        let mut result = Vec::new();
        while self.input_buf.len() >= self.chunk_size {
            self.run_block(&mut result)?;
        }
        self.produced += result.len();
        Ok(result)
    }

    /// Flush the buffered remainder (zero-padded to one block) and trim the
    /// total output to `round(consumed × ratio)` samples.
    pub fn finish(&mut self) -> Result<Vec<f32>> {
        if self.resampler.is_none() {
            return Ok(Vec::new());
        }

        let expected_total = (self.consumed as f64 * self.ratio).round() as usize;
        let mut result = Vec::new();

        if !self.input_buf.is_empty() {
            self.input_buf.resize(self.chunk_size, 0.0);
            self.run_block(&mut result)?;
        }

        // Zero blocks cover rubato's internal delay on short inputs.
        let mut guard = 0;
        while self.produced + result.len() < expected_total && guard < 4 {
            self.input_buf.resize(self.chunk_size, 0.0);
            self.run_block(&mut result)?;
            guard += 1;
        }

        let keep = expected_total.saturating_sub(self.produced).min(result.len());
        result.truncate(keep);
        self.produced += result.len();
        Ok(result)
    }

    /// Resample a whole buffer in one go.
    pub fn convert_all(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let mut out = self.process(samples)?;
        out.extend(self.finish()?);
        Ok(out)
    }

    /// Returns `true` when source rate == target rate (no resampling occurs).
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    fn run_block(&mut self, result: &mut Vec<f32>) -> Result<()> {
        let Some(ref mut resampler) = self.resampler else {
            return Ok(());
        };
        let input_slice = &self.input_buf[..self.chunk_size];

        let (_consumed, produced) = resampler
            .process_into_buffer(&[input_slice], &mut self.output_buf, None)
            .map_err(|e| VeditError::Resample(format!("block at sample {}: {e}", self.consumed)))?;
        result.extend_from_slice(&self.output_buf[0][..produced]);

        self.input_buf.drain(..self.chunk_size);
        Ok(())
    }
}
