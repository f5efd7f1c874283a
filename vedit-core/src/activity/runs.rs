//! Run segmentation over an activity mask.
//!
//! ## Algorithm
//!
//! Two states, `Idle` and `InRun`, plus a silence counter:
//!
//! 1. Idle, active frame → open a run at this frame.
//! 2. InRun, active frame → clear the silence counter.
//! 3. InRun, inactive frame → if the counter already holds
//!    `max_silence_frames` frames, the gap is too long: close the run at the
//!    last active frame and go Idle. Otherwise count the frame and keep going.
//! 4. End of input while InRun → close the run at the end of the mask.
//!
//! A closed run is kept only when it spans at least `min_segment_frames`
//! frames. Gaps of up to `max_silence_frames` frames are absorbed into the
//! surrounding run, each gap judged on its own.

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, VeditError},
    timing::FrameClock,
};

/// Half-open frame interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameRun {
    pub start: usize,
    pub end: usize,
}

impl FrameRun {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Gap tolerance and minimum length, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SilenceTolerance {
    /// Longest silent gap absorbed into a run. Default: 0.05 s.
    pub max_silence_secs: f64,
    /// Shortest run worth keeping. Default: 0.1 s.
    pub min_segment_secs: f64,
}

impl Default for SilenceTolerance {
    fn default() -> Self {
        Self {
            max_silence_secs: 0.05,
            min_segment_secs: 0.1,
        }
    }
}

impl SilenceTolerance {
    /// # Errors
    /// `InvalidConfiguration` for negative or non-finite lengths.
    pub fn new(max_silence_secs: f64, min_segment_secs: f64) -> Result<Self> {
        let tolerance = Self {
            max_silence_secs,
            min_segment_secs,
        };
        tolerance.validate()?;
        Ok(tolerance)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("max_silence_secs", self.max_silence_secs),
            ("min_segment_secs", self.min_segment_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(VeditError::config(format!(
                    "{name} must be a non-negative number of seconds (got {value})"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum RunState {
    Idle,
    InRun { start: usize, silence: usize },
}

/// Gap-tolerant run detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSegmenter {
    max_silence_frames: usize,
    min_segment_frames: usize,
}

impl RunSegmenter {
    pub fn new(max_silence_frames: usize, min_segment_frames: usize) -> Self {
        Self {
            max_silence_frames,
            min_segment_frames,
        }
    }

    /// Convert second-based tolerances with `round(secs · sr / hop)`.
    pub fn from_tolerance(tolerance: &SilenceTolerance, clock: &FrameClock) -> Result<Self> {
        tolerance.validate()?;
        Ok(Self::new(
            clock.frames_for_duration(tolerance.max_silence_secs)?,
            clock.frames_for_duration(tolerance.min_segment_secs)?,
        ))
    }

    pub fn max_silence_frames(&self) -> usize {
        self.max_silence_frames
    }

    pub fn min_segment_frames(&self) -> usize {
        self.min_segment_frames
    }

    /// Segment `mask` into ordered, non-overlapping runs.
    pub fn segment(&self, mask: &[bool]) -> Vec<FrameRun> {
        let mut runs = Vec::new();
        let mut state = RunState::Idle;

        for (i, &active) in mask.iter().enumerate() {
            state = match (state, active) {
                (RunState::Idle, true) => RunState::InRun {
                    start: i,
                    silence: 0,
                },
                (RunState::Idle, false) => RunState::Idle,
                (RunState::InRun { start, .. }, true) => RunState::InRun { start, silence: 0 },
                (RunState::InRun { start, silence }, false) => {
                    if silence >= self.max_silence_frames {
                        self.close(&mut runs, start, i - silence);
                        RunState::Idle
                    } else {
                        RunState::InRun {
                            start,
                            silence: silence + 1,
                        }
                    }
                }
            };
        }

        if let RunState::InRun { start, .. } = state {
            self.close(&mut runs, start, mask.len());
        }

        runs
    }

    fn close(&self, runs: &mut Vec<FrameRun>, start: usize, end: usize) {
        if end - start >= self.min_segment_frames {
            runs.push(FrameRun::new(start, end));
        }
    }
}

/// Maximal runs of `true`, with no gap tolerance and no minimum length.
pub fn contiguous_runs(mask: &[bool]) -> Vec<FrameRun> {
    let mut runs = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, &flag) in mask.iter().enumerate() {
        match (flag, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                runs.push(FrameRun::new(start, i));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        runs.push(FrameRun::new(start, mask.len()));
    }
    runs
}

/// Merge neighbouring runs whose gap is at most `min_gap` frames.
///
/// Input must be sorted by `start`; output stays sorted and non-overlapping.
pub fn merge_close_runs(runs: &[FrameRun], min_gap: usize) -> Vec<FrameRun> {
    let mut merged: Vec<FrameRun> = Vec::with_capacity(runs.len());
    for &run in runs {
        match merged.last_mut() {
            Some(last) if run.start.saturating_sub(last.end) <= min_gap => {
                last.end = last.end.max(run.end);
            }
            _ => merged.push(run),
        }
    }
    merged
}
