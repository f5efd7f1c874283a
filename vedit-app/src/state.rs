//! Application state shared by command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use vedit_core::{AutoCutEngine, WavLoader, WaveformLoader};

use crate::settings::{load_settings, save_settings, AppSettings};

pub struct AppState {
    /// The core engine. Wrapped in `Arc` so event-forwarding tasks can hold it.
    pub engine: Arc<AutoCutEngine>,
    /// Decodes source files into mono waveforms.
    pub loader: Arc<dyn WaveformLoader>,
    /// Persisted app settings cache.
    pub settings: Arc<Mutex<AppSettings>>,
    /// Absolute path to `settings.json`.
    pub settings_path: PathBuf,
}

impl AppState {
    /// Load settings from `settings_path` and build an engine and WAV loader
    /// configured from them.
    pub fn load(settings_path: PathBuf) -> Self {
        let settings = load_settings(&settings_path);
        let loader = Arc::new(WavLoader::new(settings.loader_config()));
        Self::with_loader(settings_path, settings, loader)
    }

    pub fn with_loader(
        settings_path: PathBuf,
        settings: AppSettings,
        loader: Arc<dyn WaveformLoader>,
    ) -> Self {
        let engine = Arc::new(AutoCutEngine::new(settings.engine_config()));
        Self {
            engine,
            loader,
            settings: Arc::new(Mutex::new(settings)),
            settings_path,
        }
    }

    pub fn settings_snapshot(&self) -> AppSettings {
        self.settings.lock().clone()
    }

    /// Apply `update`, validate, push engine defaults and persist. On error
    /// nothing changes.
    pub fn update_settings(&self, update: impl FnOnce(&mut AppSettings)) -> anyhow::Result<()> {
        let mut settings = self.settings.lock();
        let mut next = settings.clone();
        update(&mut next);
        next.validate()?;
        next.normalize();
        self.engine.set_config(next.engine_config())?;
        save_settings(&self.settings_path, &next)?;
        *settings = next;
        Ok(())
    }
}
