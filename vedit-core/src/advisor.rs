//! Threshold suggestions and silence diagnostics.
//!
//! Percentiles instead of raw extremes keep a single clipped or dead frame
//! from dragging the suggested band around:
//!
//! | Field | Percentile |
//! |-------|-----------|
//! | `min_db` / `max_db` | 1st / 99th |
//! | `suggested_min_db` / `suggested_max_db` | 10th / 90th |

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    activity::{runs::contiguous_runs, DecibelBand},
    envelope::Envelope,
    error::{Result, VeditError},
};

/// Default level below which a frame counts as silence.
pub const DEFAULT_SILENCE_THRESHOLD_DB: f32 = -40.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorConfig {
    /// Frames strictly below this level are silent. Default: -40 dB.
    pub silence_threshold_db: f32,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            silence_threshold_db: DEFAULT_SILENCE_THRESHOLD_DB,
        }
    }
}

/// Envelope statistics used to pre-fill the band and summarise silence.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    pub min_db: f32,
    pub max_db: f32,
    pub mean_db: f32,
    /// Fraction of frames below the silence threshold, in [0, 1].
    pub silence_ratio: f64,
    /// `silence_ratio × source duration`, seconds.
    pub silence_duration: f64,
    /// Longest contiguous silent stretch, seconds.
    pub longest_silence: f64,
    pub suggested_min_db: f32,
    pub suggested_max_db: f32,
}

impl AnalysisStats {
    /// The 10th–90th percentile band as a classifier input.
    pub fn suggested_band(&self) -> Result<DecibelBand> {
        DecibelBand::new(self.suggested_min_db, self.suggested_max_db)
    }
}

/// Compute statistics over `envelope`. An empty envelope yields all-zero stats.
///
/// # Errors
/// `InvalidConfiguration` for a non-finite silence threshold or an envelope
/// whose sample rate is zero.
pub fn analyze(envelope: &Envelope, config: &AdvisorConfig) -> Result<AnalysisStats> {
    if !config.silence_threshold_db.is_finite() {
        return Err(VeditError::config(format!(
            "silence threshold must be finite (got {})",
            config.silence_threshold_db
        )));
    }
    if envelope.is_empty() {
        return Ok(AnalysisStats::default());
    }

    let clock = envelope.clock()?;
    let values = envelope.values();

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mean_db = (values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64) as f32;

    let silent: Vec<bool> = values
        .iter()
        .map(|&db| db < config.silence_threshold_db)
        .collect();
    let silent_frames = silent.iter().filter(|&&s| s).count();
    let silence_ratio = silent_frames as f64 / values.len() as f64;
    let longest_frames = contiguous_runs(&silent)
        .iter()
        .map(|r| r.len())
        .max()
        .unwrap_or(0);

    let stats = AnalysisStats {
        min_db: percentile_sorted(&sorted, 1.0),
        max_db: percentile_sorted(&sorted, 99.0),
        mean_db,
        silence_ratio,
        silence_duration: silence_ratio * envelope.source_duration_secs(),
        longest_silence: longest_frames as f64 * clock.frame_duration(),
        suggested_min_db: percentile_sorted(&sorted, 10.0),
        suggested_max_db: percentile_sorted(&sorted, 90.0),
    };

    debug!(
        frames = values.len(),
        silence_ratio,
        longest_frames,
        suggested_min = stats.suggested_min_db,
        suggested_max = stats.suggested_max_db,
        "envelope analysed"
    );
    Ok(stats)
}

/// `q`-th percentile (0–100) of unsorted `values`, linearly interpolated.
/// Returns `0.0` for an empty slice.
pub fn percentile(values: &[f32], q: f64) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(&sorted, q)
}

fn percentile_sorted(sorted: &[f32], q: f64) -> f32 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (q.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let lo_v = f64::from(sorted[lo]);
            let hi_v = f64::from(sorted[hi]);
            (lo_v + (hi_v - lo_v) * (rank - lo as f64)) as f32
        }
    }
}
