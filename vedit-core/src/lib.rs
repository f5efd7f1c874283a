//! # vedit-core
//!
//! Silence-based auto-segmentation engine for the vedit editor.
//!
//! ## Architecture
//!
//! ```text
//! WaveformLoader → Waveform ─► Envelope (RMS dB, per frame)
//!                                 │
//!                   ┌─────────────┴──────────────┐
//!                   ▼                            ▼
//!        ActivityMask (DecibelBand)       advisor::analyze
//!                   │                            │
//!           RunSegmenter (gap tolerance)    AnalysisStats
//!                   │                     (suggested band)
//!           FrameClock → Vec<Segment>
//! ```
//!
//! Every stage is a pure function. `AutoCutEngine` runs them as background
//! jobs and broadcasts results as `EngineEvent`s.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod activity;
pub mod advisor;
pub mod audio;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod ipc;
pub mod timing;

// Convenience re-exports for downstream crates
pub use activity::{
    runs::{FrameRun, RunSegmenter, SilenceTolerance},
    ActivityMask, DecibelBand,
};
pub use advisor::{AdvisorConfig, AnalysisStats};
pub use audio::{wav::WavLoader, LoaderConfig, Waveform, WaveformLoader};
pub use engine::{AutoCutEngine, EngineConfig, Job, JobOutput};
pub use envelope::{Envelope, EnvelopeConfig, FrameProfile, DB_FLOOR};
pub use error::VeditError;
pub use ipc::events::{AnalysisReport, EngineEvent, EngineStatus, EngineStatusEvent, Segment};
pub use timing::FrameClock;
