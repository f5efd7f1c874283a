//! Command handlers behind the CLI subcommands.
//!
//! Each handler takes the shared [`AppState`], drives the engine and returns
//! a serialisable result; `main` decides how to print it.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use serde::Serialize;
use tracing::{info, warn};
use vedit_core::{
    AnalysisStats, DecibelBand, FrameProfile, Job, JobOutput, Segment, SilenceTolerance,
    Waveform,
};

use crate::export::{write_script, ExportMode, ExportPlan, ScriptFlavour};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnalysis {
    pub source: PathBuf,
    pub duration_secs: f64,
    pub stats: AnalysisStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedSource {
    pub source: PathBuf,
    pub error: String,
}

/// Per-file statistics plus the range across every file that loaded.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAnalysis {
    pub files: Vec<FileAnalysis>,
    pub failures: Vec<FailedSource>,
    pub global_min_db: Option<f32>,
    pub global_max_db: Option<f32>,
}

/// Where the band for a cut comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandChoice {
    Explicit(DecibelBand),
    /// The band stored in settings.
    Saved,
    /// Analyse first and use the advisor's 10th–90th percentile band.
    Suggested,
}

#[derive(Debug, Clone)]
pub struct CutOptions {
    pub band: BandChoice,
    /// Coarse editor preview instead of the precise cut profile.
    pub preview: bool,
    pub max_silence_secs: Option<f64>,
    pub min_segment_secs: Option<f64>,
    pub save_band: bool,
    pub script: Option<PathBuf>,
    pub flavour: Option<ScriptFlavour>,
    pub mode: Option<ExportMode>,
    pub output: String,
}

impl Default for CutOptions {
    fn default() -> Self {
        Self {
            band: BandChoice::Saved,
            preview: false,
            max_silence_secs: None,
            min_segment_secs: None,
            save_band: false,
            script: None,
            flavour: None,
            mode: None,
            output: "output.mp4".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CutOutcome {
    pub source: PathBuf,
    pub profile: &'static str,
    pub band: DecibelBand,
    pub segments: Vec<Segment>,
    pub kept_secs: f64,
    pub script: Option<PathBuf>,
}

/// Decode `path` on a blocking thread.
pub async fn load_waveform(state: &AppState, path: &Path) -> anyhow::Result<Arc<Waveform>> {
    let loader = Arc::clone(&state.loader);
    let owned = path.to_path_buf();
    let waveform = tokio::task::spawn_blocking(move || loader.load(&owned))
        .await
        .map_err(|e| anyhow!("loader task died: {e}"))??;
    Ok(Arc::new(waveform))
}

async fn analyze_one(state: &AppState, path: &Path) -> anyhow::Result<FileAnalysis> {
    let waveform = load_waveform(state, path).await?;
    match state.engine.run(Job::analyze(path, waveform)).await? {
        JobOutput::Analysis(report) => Ok(FileAnalysis {
            source: report.source,
            duration_secs: report.duration_secs,
            stats: report.stats,
        }),
        JobOutput::Segments(_) => Err(anyhow!("analysis job returned segments")),
    }
}

/// Analyse `paths` one after another. A file that fails is reported and
/// skipped; it does not contribute to the global range.
pub async fn analyze_files(state: &AppState, paths: &[PathBuf]) -> BatchAnalysis {
    let mut batch = BatchAnalysis::default();

    for path in paths {
        match analyze_one(state, path).await {
            Ok(file) => {
                batch.global_min_db = Some(
                    batch
                        .global_min_db
                        .map_or(file.stats.min_db, |m| m.min(file.stats.min_db)),
                );
                batch.global_max_db = Some(
                    batch
                        .global_max_db
                        .map_or(file.stats.max_db, |m| m.max(file.stats.max_db)),
                );
                batch.files.push(file);
            }
            Err(e) => {
                warn!(source = %path.display(), "analysis failed: {e:#}");
                batch.failures.push(FailedSource {
                    source: path.clone(),
                    error: format!("{e:#}"),
                });
            }
        }
    }

    info!(
        analysed = batch.files.len(),
        failed = batch.failures.len(),
        "batch analysis finished"
    );
    batch
}

/// Human-readable silence report.
pub fn render_summary(batch: &BatchAnalysis) -> String {
    let mut out = String::new();
    for file in &batch.files {
        let s = &file.stats;
        let _ = writeln!(out, "{}  ({:.2} s)", file.source.display(), file.duration_secs);
        let _ = writeln!(
            out,
            "  level      {:.1} .. {:.1} dB (mean {:.1} dB)",
            s.min_db, s.max_db, s.mean_db
        );
        let _ = writeln!(
            out,
            "  silence    {:.1} % ({:.2} s), longest {:.2} s",
            s.silence_ratio * 100.0,
            s.silence_duration,
            s.longest_silence
        );
        let _ = writeln!(
            out,
            "  suggested  {:.1} .. {:.1} dB",
            s.suggested_min_db, s.suggested_max_db
        );
    }
    for failed in &batch.failures {
        let _ = writeln!(out, "{}  FAILED: {}", failed.source.display(), failed.error);
    }
    if let (Some(min), Some(max)) = (batch.global_min_db, batch.global_max_db) {
        let _ = writeln!(out, "global range  {min:.1} .. {max:.1} dB");
    }
    out
}

/// Segment one file and optionally write an export script for it.
pub async fn cut_file(
    state: &AppState,
    path: &Path,
    options: &CutOptions,
) -> anyhow::Result<CutOutcome> {
    let settings = state.settings_snapshot();

    // Overrides apply to this cut only; the engine keeps the saved defaults.
    let defaults = settings.tolerance();
    let tolerance = SilenceTolerance::new(
        options
            .max_silence_secs
            .unwrap_or(defaults.max_silence_secs),
        options
            .min_segment_secs
            .unwrap_or(defaults.min_segment_secs),
    )?;

    let waveform = load_waveform(state, path).await?;

    let band = match options.band {
        BandChoice::Explicit(band) => band,
        BandChoice::Saved => settings.band()?,
        BandChoice::Suggested => match state
            .engine
            .run(Job::analyze(path, Arc::clone(&waveform)))
            .await?
        {
            JobOutput::Analysis(report) => report.stats.suggested_band()?,
            JobOutput::Segments(_) => return Err(anyhow!("analysis job returned segments")),
        },
    };

    let profile: FrameProfile = if options.preview {
        settings.preview_profile()
    } else {
        settings.cut_profile()
    };

    let segments = match state
        .engine
        .run(Job::auto_cut(path, waveform, band, profile).with_tolerance(tolerance))
        .await?
    {
        JobOutput::Segments(segments) => segments,
        JobOutput::Analysis(_) => return Err(anyhow!("auto-cut job returned an analysis")),
    };
    let kept_secs = segments.iter().map(Segment::duration).sum();

    info!(
        source = %path.display(),
        profile = profile.name(),
        min_db = band.min_db(),
        max_db = band.max_db(),
        segments = segments.len(),
        "cut finished"
    );

    if options.save_band {
        state
            .update_settings(|s| {
                s.band_min_db = band.min_db();
                s.band_max_db = band.max_db();
            })
            .context("saving band to settings")?;
    }

    let script = match &options.script {
        Some(script_path) => {
            let flavour = options
                .flavour
                .or_else(|| ScriptFlavour::from_path(script_path))
                .unwrap_or_else(|| settings.script_flavour());
            let mode = options.mode.unwrap_or_else(|| settings.export_mode());
            let plan = ExportPlan::from_segments(&segments, mode, options.output.clone());
            write_script(script_path, &plan, flavour)?;
            info!(script = %script_path.display(), flavour = flavour.name(), "export script written");
            Some(script_path.clone())
        }
        None => None,
    };

    Ok(CutOutcome {
        source: path.to_path_buf(),
        profile: profile.name(),
        band,
        segments,
        kept_secs,
        script,
    })
}

pub fn render_segments(outcome: &CutOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}  [{}]  band {:.1} .. {:.1} dB",
        outcome.source.display(),
        outcome.profile,
        outcome.band.min_db(),
        outcome.band.max_db()
    );
    for (i, seg) in outcome.segments.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {:>3}  {:>9.3} → {:>9.3}  ({:.3} s)",
            i + 1,
            seg.start_time,
            seg.end_time,
            seg.duration()
        );
    }
    let _ = writeln!(
        out,
        "{} segments, {:.2} s kept",
        outcome.segments.len(),
        outcome.kept_secs
    );
    if let Some(script) = &outcome.script {
        let _ = writeln!(out, "script written to {}", script.display());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use vedit_core::{VeditError, WaveformLoader};

    use crate::settings::{load_settings, AppSettings};

    const RATE: u32 = 44_100;

    struct MemoryLoader(HashMap<PathBuf, Waveform>);

    impl WaveformLoader for MemoryLoader {
        fn load(&self, path: &Path) -> vedit_core::error::Result<Waveform> {
            self.0.get(path).cloned().ok_or_else(|| VeditError::Decode {
                path: path.to_path_buf(),
                reason: "not found".into(),
            })
        }
    }

    fn blocks(pattern: &[(f32, f64)]) -> Waveform {
        let mut samples = Vec::new();
        for &(amp, secs) in pattern {
            let n = (secs * RATE as f64) as usize;
            samples.extend((0..n).map(|i| if i % 2 == 0 { amp } else { -amp }));
        }
        Waveform::new(samples, RATE)
    }

    fn state(dir: &tempfile::TempDir) -> AppState {
        let mut sources = HashMap::new();
        sources.insert(
            PathBuf::from("talk.wav"),
            blocks(&[(0.0, 0.5), (0.5, 1.0), (0.0, 0.6), (0.4, 1.5), (0.0, 0.4)]),
        );
        sources.insert(PathBuf::from("hum.wav"), blocks(&[(0.02, 2.0), (0.0, 0.5)]));
        AppState::with_loader(
            dir.path().join("settings.json"),
            AppSettings::default(),
            Arc::new(MemoryLoader(sources)),
        )
    }

    #[tokio::test]
    async fn batch_keeps_going_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let paths = vec![
            PathBuf::from("talk.wav"),
            PathBuf::from("missing.wav"),
            PathBuf::from("hum.wav"),
        ];

        let batch = analyze_files(&state, &paths).await;
        assert_eq!(batch.files.len(), 2);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].source, PathBuf::from("missing.wav"));

        let min = batch.files.iter().map(|f| f.stats.min_db).fold(f32::INFINITY, f32::min);
        let max = batch.files.iter().map(|f| f.stats.max_db).fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(batch.global_min_db, Some(min));
        assert_eq!(batch.global_max_db, Some(max));

        let text = render_summary(&batch);
        assert!(text.contains("talk.wav"));
        assert!(text.contains("FAILED"));
        assert!(text.contains("global range"));
    }

    #[tokio::test]
    async fn empty_batch_has_no_range() {
        let dir = tempfile::tempdir().unwrap();
        let batch = analyze_files(&state(&dir), &[]).await;
        assert!(batch.global_min_db.is_none());
        assert!(!render_summary(&batch).contains("global range"));
    }

    #[tokio::test]
    async fn explicit_band_cut_writes_script() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let script = dir.path().join("cut.sh");
        let options = CutOptions {
            band: BandChoice::Explicit(DecibelBand::new(-30.0, 0.0).unwrap()),
            script: Some(script.clone()),
            ..CutOptions::default()
        };

        let outcome = cut_file(&state, Path::new("talk.wav"), &options).await.unwrap();
        assert_eq!(outcome.segments.len(), 2);
        assert_eq!(outcome.profile, "cut-point");
        assert!(outcome.kept_secs > 2.4 && outcome.kept_secs < 2.6);

        let text = std::fs::read_to_string(&script).unwrap();
        assert!(text.starts_with("#!/bin/sh"));
        assert!(text.contains("temp_1.mp4"));
        assert!(render_segments(&outcome).contains("2 segments"));
    }

    #[tokio::test]
    async fn long_tolerance_merges_segments() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let options = CutOptions {
            band: BandChoice::Explicit(DecibelBand::new(-30.0, 0.0).unwrap()),
            max_silence_secs: Some(1.0),
            preview: true,
            ..CutOptions::default()
        };

        let outcome = cut_file(&state, Path::new("talk.wav"), &options).await.unwrap();
        assert_eq!(outcome.profile, "overview");
        assert_eq!(outcome.segments.len(), 1);
    }

    #[tokio::test]
    async fn suggested_band_is_saved_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let options = CutOptions {
            band: BandChoice::Suggested,
            save_band: true,
            ..CutOptions::default()
        };

        let outcome = cut_file(&state, Path::new("talk.wav"), &options).await.unwrap();
        assert!(!outcome.segments.is_empty());

        let saved = load_settings(&dir.path().join("settings.json"));
        assert_eq!(saved.band_min_db, outcome.band.min_db());
        assert_eq!(saved.band_max_db, outcome.band.max_db());
    }

    #[tokio::test]
    async fn negative_tolerance_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let options = CutOptions {
            min_segment_secs: Some(-0.5),
            ..CutOptions::default()
        };
        assert!(cut_file(&state, Path::new("talk.wav"), &options).await.is_err());
    }

    #[tokio::test]
    async fn tolerance_override_applies_to_one_cut_only() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir);
        let band = BandChoice::Explicit(DecibelBand::new(-30.0, 0.0).unwrap());

        let bridged = CutOptions {
            band,
            max_silence_secs: Some(1.0),
            ..CutOptions::default()
        };
        let first = cut_file(&state, Path::new("talk.wav"), &bridged).await.unwrap();
        assert_eq!(first.segments.len(), 1);

        let plain = CutOptions {
            band,
            ..CutOptions::default()
        };
        let second = cut_file(&state, Path::new("talk.wav"), &plain).await.unwrap();
        assert_eq!(second.segments.len(), 2);

        assert_eq!(state.engine.config().tolerance.max_silence_secs, 0.05);
        assert_eq!(state.settings_snapshot().max_silence_secs, 0.05);
    }
}
