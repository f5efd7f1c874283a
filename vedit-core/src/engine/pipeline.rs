//! Pure analysis pipeline.
//!
//! ## Stages
//!
//! ```text
//! auto-cut:  Waveform → Envelope → ActivityMask → Vec<FrameRun> → Vec<Segment>
//! analysis:  Waveform → Envelope → AnalysisStats
//! ```
//!
//! Every function here is a pure function of its arguments: no I/O, no shared
//! state besides the optional diagnostics counters. `AutoCutEngine` runs them
//! inside `spawn_blocking`; callers that already sit on a worker thread may
//! call them directly.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::{
    activity::{
        runs::{FrameRun, RunSegmenter, SilenceTolerance},
        ActivityMask, DecibelBand,
    },
    advisor::{self, AdvisorConfig},
    audio::Waveform,
    envelope::{Envelope, FrameProfile},
    error::{Result, VeditError},
    ipc::events::{AnalysisReport, Segment},
    timing::FrameClock,
};

#[derive(Default)]
pub struct PipelineDiagnostics {
    pub jobs_submitted: AtomicUsize,
    pub jobs_completed: AtomicUsize,
    pub jobs_failed: AtomicUsize,
    pub frames_analyzed: AtomicUsize,
    pub segments_emitted: AtomicUsize,
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.jobs_submitted.store(0, Ordering::Relaxed);
        self.jobs_completed.store(0, Ordering::Relaxed);
        self.jobs_failed.store(0, Ordering::Relaxed);
        self.frames_analyzed.store(0, Ordering::Relaxed);
        self.segments_emitted.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            frames_analyzed: self.frames_analyzed.load(Ordering::Relaxed),
            segments_emitted: self.segments_emitted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub jobs_submitted: usize,
    pub jobs_completed: usize,
    pub jobs_failed: usize,
    pub frames_analyzed: usize,
    pub segments_emitted: usize,
}

/// Parameters of one auto-cut pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutParams {
    pub band: DecibelBand,
    pub profile: FrameProfile,
    pub tolerance: SilenceTolerance,
}

impl CutParams {
    /// Reject anything that would make the pass meaningless, before any work.
    pub fn validate(&self, sample_rate: u32) -> Result<()> {
        let config = self.profile.envelope_config()?;
        FrameClock::new(sample_rate, config.hop_length())?;
        self.tolerance.validate()
    }
}

/// Frame-domain result of an auto-cut pass, before time mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameCut {
    pub envelope: Envelope,
    pub mask: ActivityMask,
    pub runs: Vec<FrameRun>,
}

/// Envelope → mask → runs.
pub fn cut_frames(waveform: &Waveform, params: &CutParams) -> Result<FrameCut> {
    let config = params.profile.envelope_config()?;
    let envelope = Envelope::compute(waveform, config);
    let clock = envelope.clock()?;
    let segmenter = RunSegmenter::from_tolerance(&params.tolerance, &clock)?;

    let mask = ActivityMask::classify(envelope.values(), &params.band);
    let runs = segmenter.segment(mask.as_slice());

    debug!(
        profile = params.profile.name(),
        frames = envelope.len(),
        active = mask.active_count(),
        max_silence_frames = segmenter.max_silence_frames(),
        min_segment_frames = segmenter.min_segment_frames(),
        runs = runs.len(),
        "frames segmented"
    );

    Ok(FrameCut {
        envelope,
        mask,
        runs,
    })
}

/// Map frame runs to time-ordered segments of `source`.
pub fn runs_to_segments(runs: &[FrameRun], clock: &FrameClock, source: &Path) -> Vec<Segment> {
    runs.iter()
        .map(|run| Segment {
            start_time: clock.frames_to_seconds(run.start),
            end_time: clock.frames_to_seconds(run.end),
            source: source.to_path_buf(),
        })
        .collect()
}

/// Full auto-cut: ordered, non-overlapping active segments of `waveform`.
pub fn auto_cut(waveform: &Waveform, source: &Path, params: &CutParams) -> Result<Vec<Segment>> {
    let cut = cut_frames(waveform, params)?;
    let clock = cut.envelope.clock()?;
    Ok(runs_to_segments(&cut.runs, &clock, source))
}

/// Envelope + threshold statistics for one source.
pub fn analyze(
    waveform: &Waveform,
    source: &Path,
    profile: FrameProfile,
    advisor_config: &AdvisorConfig,
) -> Result<AnalysisReport> {
    if waveform.sample_rate == 0 {
        return Err(VeditError::config("sample rate must be positive"));
    }
    let envelope = Envelope::compute(waveform, profile.envelope_config()?);
    let stats = advisor::analyze(&envelope, advisor_config)?;

    Ok(AnalysisReport {
        source: source.to_path_buf(),
        duration_secs: waveform.duration_secs(),
        stats,
        envelope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// `on`/`off` lengths in samples, alternating tone and silence.
    fn bursts(pattern: &[(bool, usize)]) -> Vec<f32> {
        let mut out = Vec::new();
        for &(loud, len) in pattern {
            if loud {
                out.extend((0..len).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }));
            } else {
                out.extend(std::iter::repeat(0.0).take(len));
            }
        }
        out
    }

    fn params(min_db: f32, max_db: f32) -> CutParams {
        CutParams {
            band: DecibelBand::new(min_db, max_db).unwrap(),
            profile: FrameProfile::Custom {
                frame_length: 100,
                hop_length: 100,
            },
            tolerance: SilenceTolerance::new(0.02, 0.05).unwrap(),
        }
    }

    #[test]
    fn silent_waveform_yields_no_segments() {
        let w = Waveform::new(vec![0.0; 10_000], 10_000);
        let segs = auto_cut(&w, Path::new("s.wav"), &params(-20.0, 0.0)).unwrap();
        assert!(segs.is_empty());
    }

    #[test]
    fn fully_active_waveform_is_one_segment() {
        let w = Waveform::new(bursts(&[(true, 10_000)]), 10_000);
        let segs = auto_cut(&w, Path::new("a.wav"), &params(-20.0, 0.0)).unwrap();
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].start_time, 0.0);
        assert!((segs[0].end_time - 1.0).abs() < 1e-9);
        assert_eq!(segs[0].source, PathBuf::from("a.wav"));
    }

    #[test]
    fn long_pause_splits_short_pause_merges() {
        // 10 kHz, hop 100 → 10 ms frames; tolerance 2 frames, min 5 frames.
        let w = Waveform::new(
            bursts(&[
                (true, 2_000),
                (false, 200), // 2 frames: absorbed
                (true, 2_000),
                (false, 1_000), // 10 frames: splits
                (true, 1_000),
            ]),
            10_000,
        );
        let segs = auto_cut(&w, Path::new("p.wav"), &params(-20.0, 0.0)).unwrap();
        assert_eq!(segs.len(), 2);
        assert!((segs[0].start_time - 0.0).abs() < 1e-9);
        assert!((segs[0].end_time - 0.42).abs() < 1e-9);
        assert!((segs[1].start_time - 0.52).abs() < 1e-9);
        assert!((segs[1].end_time - 0.62).abs() < 1e-9);
    }

    #[test]
    fn invalid_band_cannot_be_built() {
        assert!(DecibelBand::new(5.0, -5.0).unwrap_err().is_invalid_configuration());
    }

    #[test]
    fn zero_frame_profile_is_rejected_before_work() {
        let mut p = params(-20.0, 0.0);
        p.profile = FrameProfile::Custom {
            frame_length: 0,
            hop_length: 64,
        };
        assert!(p.validate(44_100).unwrap_err().is_invalid_configuration());
        let w = Waveform::new(vec![0.1; 1_000], 44_100);
        assert!(auto_cut(&w, Path::new("x.wav"), &p).is_err());
    }

    #[test]
    fn zero_sample_rate_rejected() {
        let w = Waveform::new(vec![0.1; 1_000], 0);
        assert!(auto_cut(&w, Path::new("x.wav"), &params(-20.0, 0.0)).is_err());
        let report = analyze(
            &w,
            Path::new("x.wav"),
            FrameProfile::Diagnostics,
            &AdvisorConfig::default(),
        );
        assert!(report.unwrap_err().is_invalid_configuration());
    }

    #[test]
    fn empty_waveform_is_nothing_to_do() {
        let w = Waveform::new(vec![], 44_100);
        let segs = auto_cut(&w, Path::new("e.wav"), &params(-20.0, 0.0)).unwrap();
        assert!(segs.is_empty());
        let report =
            analyze(&w, Path::new("e.wav"), FrameProfile::Diagnostics, &AdvisorConfig::default())
                .unwrap();
        assert!(report.envelope.is_empty());
        assert_eq!(report.duration_secs, 0.0);
    }

    #[test]
    fn analysis_reports_silence_share() {
        let w = Waveform::new(bursts(&[(true, 5_000), (false, 5_000)]), 10_000);
        let report = analyze(
            &w,
            Path::new("h.wav"),
            FrameProfile::Custom {
                frame_length: 100,
                hop_length: 100,
            },
            &AdvisorConfig::default(),
        )
        .unwrap();
        assert!((report.stats.silence_ratio - 0.5).abs() < 1e-9);
        assert!((report.stats.longest_silence - 0.5).abs() < 1e-9);
        assert!((report.duration_secs - 1.0).abs() < 1e-12);
    }

    #[test]
    fn diagnostics_reset_and_snapshot() {
        let d = PipelineDiagnostics::default();
        d.jobs_submitted.fetch_add(3, Ordering::Relaxed);
        d.segments_emitted.fetch_add(7, Ordering::Relaxed);
        let snap = d.snapshot();
        assert_eq!(snap.jobs_submitted, 3);
        assert_eq!(snap.segments_emitted, 7);
        d.reset();
        assert_eq!(d.snapshot().segments_emitted, 0);
    }
}
