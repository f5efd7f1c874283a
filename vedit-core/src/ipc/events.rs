//! Result and event types delivered to front-ends.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a UI or CLI
//! can forward them as JSON unchanged.
//!
//! | Event | Meaning |
//! |-------|---------|
//! | `EngineEvent::AnalysisReady` | stats + envelope for one source |
//! | `EngineEvent::SegmentsReady` | ordered cut list for one source |
//! | `EngineEvent::JobFailed` | a background job returned an error |
//! | `EngineStatusEvent` | engine went busy / idle |

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{advisor::AnalysisStats, envelope::Envelope};

/// Identifier handed back by `AutoCutEngine::submit`.
pub type JobId = u64;

// ---------------------------------------------------------------------------
// Analysis output
// ---------------------------------------------------------------------------

/// An active interval of one source, in seconds. `end_time > start_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start_time: f64,
    pub end_time: f64,
    /// Opaque reference to the source the interval belongs to.
    pub source: PathBuf,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Threshold-advisor output for one source, plus the envelope it was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub source: PathBuf,
    pub duration_secs: f64,
    pub stats: AnalysisStats,
    pub envelope: Envelope,
}

// ---------------------------------------------------------------------------
// Job events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum EngineEvent {
    #[serde(rename_all = "camelCase")]
    AnalysisReady { job_id: JobId, report: AnalysisReport },
    #[serde(rename_all = "camelCase")]
    SegmentsReady {
        job_id: JobId,
        source: PathBuf,
        segments: Vec<Segment>,
    },
    #[serde(rename_all = "camelCase")]
    JobFailed {
        job_id: JobId,
        source: PathBuf,
        error: String,
    },
}

impl EngineEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            EngineEvent::AnalysisReady { job_id, .. }
            | EngineEvent::SegmentsReady { job_id, .. }
            | EngineEvent::JobFailed { job_id, .. } => *job_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Jobs still running after this transition.
    pub in_flight: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// No job running.
    Idle,
    /// At least one background job running.
    Busy,
}
