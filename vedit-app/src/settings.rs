//! Persistent application settings (JSON file in app data directory).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;
use vedit_core::{
    advisor::AdvisorConfig, engine::EngineConfig, DecibelBand, FrameProfile, LoaderConfig,
    SilenceTolerance, VeditError,
};

use crate::export::{ExportMode, ScriptFlavour};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    /// Last band used for a cut.
    pub band_min_db: f32,
    pub band_max_db: f32,
    pub silence_threshold_db: f32,
    pub max_silence_secs: f64,
    pub min_segment_secs: f64,
    pub analysis_profile: String,
    pub preview_profile: String,
    pub cut_profile: String,
    /// `0` keeps each file's native rate.
    pub target_sample_rate: u32,
    pub script_flavour: String,
    pub export_mode: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            band_min_db: -40.0,
            band_max_db: 0.0,
            silence_threshold_db: -40.0,
            max_silence_secs: 0.05,
            min_segment_secs: 0.1,
            analysis_profile: "diagnostics".into(),
            preview_profile: "overview".into(),
            cut_profile: "cut-point".into(),
            target_sample_rate: vedit_core::audio::DEFAULT_ANALYSIS_RATE,
            script_flavour: ScriptFlavour::platform_default().name().into(),
            export_mode: "video".into(),
        }
    }
}

impl AppSettings {
    /// Reject values the engine would refuse. Nothing here is clamped.
    ///
    /// # Errors
    /// `InvalidConfiguration` for an inverted or non-finite band, a negative
    /// or non-finite tolerance, or a non-finite silence threshold.
    pub fn validate(&self) -> vedit_core::error::Result<()> {
        self.band()?;
        SilenceTolerance::new(self.max_silence_secs, self.min_segment_secs)?;
        if !self.silence_threshold_db.is_finite() {
            return Err(VeditError::InvalidConfiguration(format!(
                "silence threshold must be finite, got {}",
                self.silence_threshold_db
            )));
        }
        Ok(())
    }

    /// Canonicalise names and the loader rate. Numeric tuning values are left
    /// to [`validate`](Self::validate).
    pub fn normalize(&mut self) {
        self.analysis_profile = normalize_profile_name(&self.analysis_profile, "diagnostics");
        self.preview_profile = normalize_profile_name(&self.preview_profile, "overview");
        self.cut_profile = normalize_profile_name(&self.cut_profile, "cut-point");

        if self.target_sample_rate != 0 {
            self.target_sample_rate = self.target_sample_rate.clamp(8_000, 192_000);
        }
        self.script_flavour = normalize_script_flavour(&self.script_flavour);
        self.export_mode = normalize_export_mode(&self.export_mode);
    }

    pub fn band(&self) -> vedit_core::error::Result<DecibelBand> {
        DecibelBand::new(self.band_min_db, self.band_max_db)
    }

    pub fn tolerance(&self) -> SilenceTolerance {
        SilenceTolerance {
            max_silence_secs: self.max_silence_secs,
            min_segment_secs: self.min_segment_secs,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            analysis_profile: profile_from_name(&self.analysis_profile),
            tolerance: self.tolerance(),
            advisor: AdvisorConfig {
                silence_threshold_db: self.silence_threshold_db,
            },
        }
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            target_sample_rate: (self.target_sample_rate != 0).then_some(self.target_sample_rate),
            ..LoaderConfig::default()
        }
    }

    pub fn preview_profile(&self) -> FrameProfile {
        profile_from_name(&self.preview_profile)
    }

    pub fn cut_profile(&self) -> FrameProfile {
        profile_from_name(&self.cut_profile)
    }

    pub fn script_flavour(&self) -> ScriptFlavour {
        match self.script_flavour.as_str() {
            "shell" => ScriptFlavour::Shell,
            _ => ScriptFlavour::Batch,
        }
    }

    pub fn export_mode(&self) -> ExportMode {
        match self.export_mode.as_str() {
            "audio" => ExportMode::Audio,
            _ => ExportMode::Video,
        }
    }
}

pub fn normalize_profile_name(raw: &str, fallback: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "overview" | "preview" | "display" => "overview".into(),
        "diagnostics" | "analysis" | "analyze" => "diagnostics".into(),
        "cut-point" | "cut_point" | "cutpoint" | "cut" | "precise" => "cut-point".into(),
        _ => fallback.into(),
    }
}

/// Map a normalised profile name onto the engine preset.
pub fn profile_from_name(name: &str) -> FrameProfile {
    match normalize_profile_name(name, "cut-point").as_str() {
        "overview" => FrameProfile::Overview,
        "diagnostics" => FrameProfile::Diagnostics,
        _ => FrameProfile::CutPoint,
    }
}

pub fn normalize_script_flavour(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "batch" | "bat" | "cmd" | "windows" => "batch".into(),
        "shell" | "sh" | "bash" | "posix" => "shell".into(),
        _ => ScriptFlavour::platform_default().name().into(),
    }
}

pub fn normalize_export_mode(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "audio" | "wav" | "mp3" => "audio".into(),
        _ => "video".into(),
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vedit")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("vedit")
            .join("settings.json")
    }
}

/// Missing, unreadable or invalid files fall back to defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    if let Err(e) = settings.validate() {
        warn!(path = %path.display(), "ignoring stored settings: {e}");
        settings = AppSettings::default();
    }
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
