//! vedit command-line entry point.
//!
//! ```text
//! vedit analyze a.wav b.wav          silence report + global dB range
//! vedit cut a.wav --min-db -35       segments of a.wav inside the band
//! vedit cut a.wav --suggest --script cut.sh
//! vedit config show|path|set|reset
//! ```
//!
//! Logs go to stderr; `RUST_LOG` overrides the default `vedit=info` filter.

mod commands;
mod export;
mod settings;
mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use vedit_core::{AutoCutEngine, DecibelBand, EngineEvent};

use commands::{BandChoice, CutOptions};
use export::{ExportMode, ScriptFlavour};
use settings::{default_settings_path, save_settings, AppSettings};
use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "vedit", version, about = "Cut media by silence")]
struct Cli {
    /// Settings file. Defaults to the platform data directory.
    #[arg(long, global = true, env = "VEDIT_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report levels and silence for each file, then the global dB range.
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Split a file into active segments.
    Cut {
        file: PathBuf,
        /// Lower band edge in dB relative to the loudest frame.
        #[arg(long, allow_hyphen_values = true, requires = "max_db")]
        min_db: Option<f32>,
        /// Upper band edge in dB.
        #[arg(long, allow_hyphen_values = true, requires = "min_db")]
        max_db: Option<f32>,
        /// Use the advisor's suggested band instead of the saved one.
        #[arg(long, conflicts_with = "min_db")]
        suggest: bool,
        /// Coarse preview resolution instead of the precise cut.
        #[arg(long)]
        preview: bool,
        /// Longest silence bridged inside a segment, seconds.
        #[arg(long)]
        max_silence: Option<f64>,
        /// Shortest segment kept, seconds.
        #[arg(long)]
        min_segment: Option<f64>,
        /// Remember the band used for the next run.
        #[arg(long)]
        save_band: bool,
        /// Write an ffmpeg script for the segments.
        #[arg(long)]
        script: Option<PathBuf>,
        #[arg(long, value_enum)]
        flavour: Option<FlavourArg>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Final file produced by the script.
        #[arg(long, default_value = "output.mp4")]
        output: String,
        #[arg(long)]
        json: bool,
    },

    /// Inspect or change persisted settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    Path,
    /// Replace settings from a JSON object; missing keys keep defaults.
    Set { json: String },
    Reset,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FlavourArg {
    Batch,
    Shell,
}

impl From<FlavourArg> for ScriptFlavour {
    fn from(arg: FlavourArg) -> Self {
        match arg {
            FlavourArg::Batch => ScriptFlavour::Batch,
            FlavourArg::Shell => ScriptFlavour::Shell,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Video,
    Audio,
}

impl From<ModeArg> for ExportMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Video => ExportMode::Video,
            ModeArg::Audio => ExportMode::Audio,
        }
    }
}

/// Log job results as they are broadcast.
fn spawn_event_logger(engine: &AutoCutEngine) -> tokio::task::JoinHandle<()> {
    let mut rx = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(EngineEvent::AnalysisReady { job_id, report }) => debug!(
                    job_id,
                    source = %report.source.display(),
                    frames = report.envelope.len(),
                    "analysis ready"
                ),
                Ok(EngineEvent::SegmentsReady {
                    job_id, segments, ..
                }) => debug!(job_id, segments = segments.len(), "segments ready"),
                Ok(EngineEvent::JobFailed { job_id, error, .. }) => {
                    warn!(job_id, "job failed: {error}")
                }
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vedit=info")),
        )
        .init();

    let cli = Cli::parse();
    let settings_path = cli.settings.unwrap_or_else(default_settings_path);

    if let Command::Config { action } = &cli.command {
        return run_config(action, settings_path);
    }

    let state = AppState::load(settings_path);
    info!(settings = %state.settings_path.display(), "vedit starting");
    let logger = spawn_event_logger(&state.engine);

    let result = match cli.command {
        Command::Analyze { files, json } => {
            let batch = commands::analyze_files(&state, &files).await;
            if json {
                print_json(&batch)?;
            } else {
                print!("{}", commands::render_summary(&batch));
            }
            if batch.files.is_empty() {
                Err(anyhow::anyhow!("no file could be analysed"))
            } else {
                Ok(())
            }
        }
        Command::Cut {
            file,
            min_db,
            max_db,
            suggest,
            preview,
            max_silence,
            min_segment,
            save_band,
            script,
            flavour,
            mode,
            output,
            json,
        } => {
            let band = match (min_db, max_db, suggest) {
                (Some(min), Some(max), _) => BandChoice::Explicit(DecibelBand::new(min, max)?),
                (_, _, true) => BandChoice::Suggested,
                _ => BandChoice::Saved,
            };
            let options = CutOptions {
                band,
                preview,
                max_silence_secs: max_silence,
                min_segment_secs: min_segment,
                save_band,
                script,
                flavour: flavour.map(Into::into),
                mode: mode.map(Into::into),
                output,
            };
            let outcome = commands::cut_file(&state, &file, &options)
                .await
                .with_context(|| format!("cutting {}", file.display()))?;
            if json {
                print_json(&outcome)
            } else {
                print!("{}", commands::render_segments(&outcome));
                Ok(())
            }
        }
        Command::Config { .. } => Ok(()),
    };

    logger.abort();
    result
}

fn run_config(action: &ConfigAction, path: PathBuf) -> Result<()> {
    match action {
        ConfigAction::Show => print_json(&settings::load_settings(&path)),
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigAction::Set { json } => {
            let mut next: AppSettings =
                serde_json::from_str(json).context("settings must be a JSON object")?;
            next.validate().context("settings rejected")?;
            next.normalize();
            save_settings(&path, &next)
                .with_context(|| format!("writing {}", path.display()))?;
            print_json(&next)
        }
        ConfigAction::Reset => {
            save_settings(&path, &AppSettings::default())
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "settings reset");
            Ok(())
        }
    }
}
