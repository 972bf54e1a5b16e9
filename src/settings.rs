// Start-up settings, read once from a JSON file. Nothing is written back:
// sessions are not persisted.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::control::MidiBindings;
use crate::error::SettingsError;
use crate::loader::MediaMode;
use crate::pipeline::config::Config;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub config: Config,
    pub source: Option<MediaMode>,
    pub image: Option<PathBuf>,
    pub video: Option<PathBuf>,
    pub midi_device: Option<String>,
    pub midi: MidiBindings,
}

pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let data = std::fs::read_to_string(path)
        .map_err(|source| SettingsError::Io { path: path.to_path_buf(), source })?;
    let mut settings: Settings = serde_json::from_str(&data)
        .map_err(|source| SettingsError::Parse { path: path.to_path_buf(), source })?;
    settings.config = settings.config.validated();
    Ok(settings)
}
