//! Persisted audio settings.
//!
//! One JSON blob under a single file, the desktop analog of a namespaced
//! local-storage key. Missing or unknown fields fall back to defaults;
//! corrupt JSON is discarded with a warning and never blocks startup.

use std::fs;
use std::path::PathBuf;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// File name of the persisted settings blob.
pub const SETTINGS_FILE: &str = "sonorbit-settings.json";

/// How many layers the sonification runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SonificationComplexity {
    /// Event one-shots only.
    Simple,
    /// Plus chord pad and planet voices.
    #[default]
    Standard,
    /// Plus ambient bed, texture bursts and the high chime octave.
    Rich,
}

/// Per-category enable flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryToggles {
    pub ambient: bool,
    pub ui: bool,
    pub sonification: bool,
    pub narration: bool,
}

impl Default for CategoryToggles {
    fn default() -> Self {
        Self {
            ambient: true,
            ui: true,
            sonification: true,
            narration: true,
        }
    }
}

/// Process-wide audio settings, persisted across sessions.
#[derive(Resource, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Master enable; off means every playback path is a no-op.
    pub enabled: bool,
    /// Master volume in [0, 1].
    pub master_volume: f64,
    pub categories: CategoryToggles,
    pub complexity: SonificationComplexity,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            master_volume: 0.7,
            categories: CategoryToggles::default(),
            complexity: SonificationComplexity::default(),
        }
    }
}

/// Settings persistence failures. Logged, never propagated.
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Loads and saves the settings blob at a fixed path.
#[derive(Resource, Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self {
            path: PathBuf::from(SETTINGS_FILE),
        }
    }
}

impl SettingsStore {
    /// Store at an explicit path (tests use a temp location).
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load settings, falling back to defaults on any failure.
    ///
    /// A missing file is the common first-run case and logs nothing; corrupt
    /// contents are discarded with a warning.
    pub fn load(&self) -> AudioSettings {
        let Ok(raw) = fs::read_to_string(&self.path) else {
            return AudioSettings::default();
        };

        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    "discarding corrupt settings at {}: {e}",
                    self.path.display()
                );
                AudioSettings::default()
            }
        }
    }

    /// Persist settings as pretty JSON.
    pub fn save(&self, settings: &AudioSettings) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Plugin persisting settings on every mutation.
///
/// The `AudioSettings` and `SettingsStore` resources are inserted by the app
/// builder; the plugin only adds the change-watcher.
pub struct SettingsPlugin;

impl Plugin for SettingsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, persist_settings_on_change);
    }
}

/// Any settings mutation immediately re-persists. The engine's own
/// change-watcher re-applies gains; this one only writes the blob.
fn persist_settings_on_change(settings: Res<AudioSettings>, store: Res<SettingsStore>) {
    if settings.is_changed() && !settings.is_added()
        && let Err(e) = store.save(&settings)
    {
        warn!("failed to persist audio settings: {e}");
    }
}
