//! `AutoCutEngine`: runs analysis and auto-cut jobs off the caller's thread.
//!
//! ## Lifecycle of a job
//!
//! ```text
//! submit(job)
//!     ├─► validate synchronously   → Err(InvalidConfiguration) returned to caller
//!     └─► spawn_blocking(pipeline) → status = Busy
//!             └─► EngineEvent::{AnalysisReady | SegmentsReady | JobFailed}
//!                 broadcast to every subscriber, status = Idle when drained
//! ```
//!
//! Jobs share nothing mutable. A newer job for the same source simply
//! produces a newer event; consumers keep the latest one.
//!
//! ## Threading
//!
//! The pipeline is CPU-bound and may take a while on long sources, so it runs
//! in `spawn_blocking` and never on the async executor. `submit` needs a Tokio
//! runtime context and reports `VeditError::NoRuntime` without one.

pub mod pipeline;

use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, info_span, warn};

use crate::{
    activity::{runs::SilenceTolerance, DecibelBand},
    advisor::AdvisorConfig,
    audio::Waveform,
    envelope::FrameProfile,
    error::{Result, VeditError},
    ipc::events::{
        AnalysisReport, EngineEvent, EngineStatus, EngineStatusEvent, JobId, Segment,
    },
    timing::FrameClock,
};

use pipeline::{CutParams, PipelineDiagnostics};

/// Broadcast channel capacity: 64 results buffered for slow consumers.
const BROADCAST_CAP: usize = 64;

/// Defaults applied to every job submitted to an `AutoCutEngine`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Envelope resolution for threshold analysis. Default: `Diagnostics`.
    pub analysis_profile: FrameProfile,
    /// Gap tolerance / minimum segment length for cuts that carry none.
    pub tolerance: SilenceTolerance,
    /// Silence threshold for diagnostics.
    pub advisor: AdvisorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analysis_profile: FrameProfile::Diagnostics,
            tolerance: SilenceTolerance::default(),
            advisor: AdvisorConfig::default(),
        }
    }
}

/// A unit of work for the engine.
#[derive(Debug, Clone)]
pub enum Job {
    /// Envelope statistics and threshold suggestion for one source.
    Analyze {
        source: PathBuf,
        waveform: Arc<Waveform>,
    },
    /// Segment one source against `band` at the given resolution.
    ///
    /// `Overview` gives the editor preview, `CutPoint` the precise cut.
    /// `tolerance: None` uses the engine default.
    AutoCut {
        source: PathBuf,
        waveform: Arc<Waveform>,
        band: DecibelBand,
        profile: FrameProfile,
        tolerance: Option<SilenceTolerance>,
    },
}

impl Job {
    pub fn analyze(source: impl Into<PathBuf>, waveform: Arc<Waveform>) -> Self {
        Job::Analyze {
            source: source.into(),
            waveform,
        }
    }

    pub fn auto_cut(
        source: impl Into<PathBuf>,
        waveform: Arc<Waveform>,
        band: DecibelBand,
        profile: FrameProfile,
    ) -> Self {
        Job::AutoCut {
            source: source.into(),
            waveform,
            band,
            profile,
            tolerance: None,
        }
    }

    /// Pin the gap tolerance of an auto-cut job. No effect on analysis jobs.
    pub fn with_tolerance(mut self, tolerance: SilenceTolerance) -> Self {
        if let Job::AutoCut { tolerance: t, .. } = &mut self {
            *t = Some(tolerance);
        }
        self
    }

    pub fn source(&self) -> &Path {
        match self {
            Job::Analyze { source, .. } | Job::AutoCut { source, .. } => source,
        }
    }
}

/// What a finished job produced.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutput {
    Analysis(AnalysisReport),
    Segments(Vec<Segment>),
}

/// A validated job with engine defaults resolved.
struct PreparedJob {
    source: PathBuf,
    waveform: Arc<Waveform>,
    work: Work,
}

enum Work {
    Analyze {
        profile: FrameProfile,
        advisor: AdvisorConfig,
    },
    Cut(CutParams),
}

impl PreparedJob {
    fn execute(&self) -> Result<JobOutput> {
        match &self.work {
            Work::Analyze { profile, advisor } => {
                pipeline::analyze(&self.waveform, &self.source, *profile, advisor)
                    .map(JobOutput::Analysis)
            }
            Work::Cut(params) => pipeline::auto_cut(&self.waveform, &self.source, params)
                .map(JobOutput::Segments),
        }
    }
}

/// Job count and the status derived from it, updated together.
#[derive(Debug)]
struct Activity {
    status: EngineStatus,
    in_flight: usize,
}

/// Shared handles the worker closure needs, cloned per job.
#[derive(Clone)]
struct JobContext {
    event_tx: broadcast::Sender<EngineEvent>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
    activity: Arc<Mutex<Activity>>,
    diagnostics: Arc<PipelineDiagnostics>,
}

/// Holds one in-flight slot; releasing it on drop covers panicking jobs.
struct InFlight {
    ctx: JobContext,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.ctx.adjust_in_flight(false);
    }
}

impl JobContext {
    fn begin(&self) -> InFlight {
        self.diagnostics.jobs_submitted.fetch_add(1, Ordering::Relaxed);
        self.adjust_in_flight(true);
        InFlight { ctx: self.clone() }
    }

    fn complete(&self, job_id: JobId, source: &Path, result: &Result<JobOutput>) {
        let event = match result {
            Ok(JobOutput::Analysis(report)) => {
                self.diagnostics
                    .frames_analyzed
                    .fetch_add(report.envelope.len(), Ordering::Relaxed);
                self.diagnostics.jobs_completed.fetch_add(1, Ordering::Relaxed);
                EngineEvent::AnalysisReady {
                    job_id,
                    report: report.clone(),
                }
            }
            Ok(JobOutput::Segments(segments)) => {
                self.diagnostics
                    .segments_emitted
                    .fetch_add(segments.len(), Ordering::Relaxed);
                self.diagnostics.jobs_completed.fetch_add(1, Ordering::Relaxed);
                EngineEvent::SegmentsReady {
                    job_id,
                    source: source.to_path_buf(),
                    segments: segments.clone(),
                }
            }
            Err(e) => {
                warn!(job_id, source = %source.display(), "job failed: {e}");
                self.diagnostics.jobs_failed.fetch_add(1, Ordering::Relaxed);
                EngineEvent::JobFailed {
                    job_id,
                    source: source.to_path_buf(),
                    error: e.to_string(),
                }
            }
        };

        // No subscribers: the result is dropped.
        let _ = self.event_tx.send(event);
    }

    /// Count and status change under one lock, and the event is sent while it
    /// is held, so subscribers see transitions in order.
    fn adjust_in_flight(&self, starting: bool) {
        let mut activity = self.activity.lock();
        activity.in_flight = if starting {
            activity.in_flight + 1
        } else {
            activity.in_flight.saturating_sub(1)
        };
        activity.status = if activity.in_flight == 0 {
            EngineStatus::Idle
        } else {
            EngineStatus::Busy
        };
        let _ = self.status_tx.send(EngineStatusEvent {
            status: activity.status,
            in_flight: activity.in_flight,
        });
    }
}

/// The top-level engine handle.
///
/// `AutoCutEngine` is `Send + Sync`; wrap it in `Arc` to share between a UI
/// thread and event-forwarding tasks.
pub struct AutoCutEngine {
    config: Mutex<EngineConfig>,
    next_job: AtomicU64,
    ctx: JobContext,
}

impl AutoCutEngine {
    pub fn new(config: EngineConfig) -> Self {
        let (event_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);

        Self {
            config: Mutex::new(config),
            next_job: AtomicU64::new(1),
            ctx: JobContext {
                event_tx,
                status_tx,
                activity: Arc::new(Mutex::new(Activity {
                    status: EngineStatus::Idle,
                    in_flight: 0,
                })),
                diagnostics: Arc::new(PipelineDiagnostics::default()),
            },
        }
    }

    /// Snapshot of the defaults applied to new jobs.
    pub fn config(&self) -> EngineConfig {
        *self.config.lock()
    }

    /// Replace the defaults. Running jobs keep the values they started with.
    ///
    /// # Errors
    /// `InvalidConfiguration` if the new values are unusable; the old
    /// configuration stays in place.
    pub fn set_config(&self, config: EngineConfig) -> Result<()> {
        config.analysis_profile.envelope_config()?;
        config.tolerance.validate()?;
        if !config.advisor.silence_threshold_db.is_finite() {
            return Err(VeditError::config("silence threshold must be finite"));
        }
        *self.config.lock() = config;
        Ok(())
    }

    /// Validate `job` and start it in the background.
    ///
    /// The result arrives as an [`EngineEvent`] on [`subscribe`](Self::subscribe).
    ///
    /// # Errors
    /// - `InvalidConfiguration` for a job that cannot succeed; nothing runs.
    /// - `NoRuntime` when called outside a Tokio runtime.
    pub fn submit(&self, job: Job) -> Result<JobId> {
        let prepared = self.prepare(job)?;
        let handle = tokio::runtime::Handle::try_current().map_err(|_| VeditError::NoRuntime)?;
        let job_id = self.next_job.fetch_add(1, Ordering::Relaxed);

        let ctx = self.ctx.clone();
        let slot = ctx.begin();
        handle.spawn_blocking(move || {
            let _slot = slot;
            Self::execute(ctx, job_id, prepared)
        });

        Ok(job_id)
    }

    /// Run `job` in the background and await its output.
    ///
    /// The result is also broadcast, exactly as for [`submit`](Self::submit).
    pub async fn run(&self, job: Job) -> Result<JobOutput> {
        let prepared = self.prepare(job)?;
        let job_id = self.next_job.fetch_add(1, Ordering::Relaxed);

        let ctx = self.ctx.clone();
        let slot = ctx.begin();
        tokio::task::spawn_blocking(move || {
            let _slot = slot;
            Self::execute(ctx, job_id, prepared)
        })
            .await
            .map_err(|e| VeditError::Other(anyhow::anyhow!("analysis task died: {e}")))?
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> EngineStatus {
        self.ctx.activity.lock().status
    }

    /// Jobs submitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.ctx.activity.lock().in_flight
    }

    /// Subscribe to job results.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.ctx.event_tx.subscribe()
    }

    /// Subscribe to busy / idle transitions.
    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.ctx.status_tx.subscribe()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn diagnostics_snapshot(&self) -> pipeline::DiagnosticsSnapshot {
        self.ctx.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn prepare(&self, job: Job) -> Result<PreparedJob> {
        let config = self.config();
        match job {
            Job::Analyze { source, waveform } => {
                let envelope = config.analysis_profile.envelope_config()?;
                FrameClock::new(waveform.sample_rate, envelope.hop_length())?;
                if !config.advisor.silence_threshold_db.is_finite() {
                    return Err(VeditError::config("silence threshold must be finite"));
                }
                Ok(PreparedJob {
                    source,
                    waveform,
                    work: Work::Analyze {
                        profile: config.analysis_profile,
                        advisor: config.advisor,
                    },
                })
            }
            Job::AutoCut {
                source,
                waveform,
                band,
                profile,
                tolerance,
            } => {
                let params = CutParams {
                    band,
                    profile,
                    tolerance: tolerance.unwrap_or(config.tolerance),
                };
                params.validate(waveform.sample_rate)?;
                Ok(PreparedJob {
                    source,
                    waveform,
                    work: Work::Cut(params),
                })
            }
        }
    }

    fn execute(ctx: JobContext, job_id: JobId, job: PreparedJob) -> Result<JobOutput> {
        let span = info_span!("job", job_id, source = %job.source.display());
        let _guard = span.enter();

        let result = job.execute();
        if let Ok(output) = &result {
            match output {
                JobOutput::Analysis(report) => info!(
                    frames = report.envelope.len(),
                    suggested_min = report.stats.suggested_min_db,
                    suggested_max = report.stats.suggested_max_db,
                    "analysis finished"
                ),
                JobOutput::Segments(segments) => {
                    info!(segments = segments.len(), "auto-cut finished")
                }
            }
        }
        ctx.complete(job_id, &job.source, &result);
        result
    }
}

impl Default for AutoCutEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
