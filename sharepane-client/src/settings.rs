use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use sharepane_core::{MergeStrategy, TransferState, VisibilityFilter};
use tracing::warn;

/// `settings.json` is expected to be tiny; anything larger is treated as corrupt.
pub const MAX_SETTINGS_BYTES: u64 = 64 * 1024;

pub const DEFAULT_DISMISS_DELAY_MS: u64 = 1_500;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SavedSettings {
    /// WebSocket URL of the backend bridge, e.g. `ws://127.0.0.1:9300/ws`.
    #[serde(default)]
    pub backend_url: Option<String>,
    /// Overrides which transfer states are shown. `None` keeps the built-in list.
    #[serde(default)]
    pub visible_states: Option<Vec<TransferState>>,
    #[serde(default)]
    pub merge_strategy: Option<MergeStrategy>,
    #[serde(default)]
    pub dismiss_delay_ms: Option<u64>,
}

impl SavedSettings {
    pub fn visibility_filter(&self) -> VisibilityFilter {
        match &self.visible_states {
            Some(states) => VisibilityFilter::new(states.iter().copied()),
            None => VisibilityFilter::default(),
        }
    }

    pub fn merge_strategy(&self) -> MergeStrategy {
        self.merge_strategy.unwrap_or_default()
    }

    pub fn dismiss_delay(&self) -> Duration {
        Duration::from_millis(self.dismiss_delay_ms.unwrap_or(DEFAULT_DISMISS_DELAY_MS))
    }
}

#[derive(Debug)]
pub enum SettingsLoadError {
    Metadata(io::Error),
    TooLarge { size: u64, max: u64 },
    Read(io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for SettingsLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsLoadError::Metadata(e) => write!(f, "cannot stat settings file: {e}"),
            SettingsLoadError::TooLarge { size, max } => {
                write!(f, "settings file is {size} bytes, larger than the {max} byte limit")
            }
            SettingsLoadError::Read(e) => write!(f, "cannot read settings file: {e}"),
            SettingsLoadError::Parse(e) => write!(f, "settings file is not valid JSON: {e}"),
        }
    }
}

impl std::error::Error for SettingsLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsLoadError::Metadata(e) => Some(e),
            SettingsLoadError::Read(e) => Some(e),
            SettingsLoadError::Parse(e) => Some(e),
            SettingsLoadError::TooLarge { .. } => None,
        }
    }
}

#[derive(Debug)]
pub enum SettingsSaveError {
    Serialize(serde_json::Error),
    CreateDir(io::Error),
    WriteTmp(io::Error),
    Rename(io::Error),
}

impl std::fmt::Display for SettingsSaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsSaveError::Serialize(e) => write!(f, "cannot encode settings: {e}"),
            SettingsSaveError::CreateDir(e) => write!(f, "cannot create settings directory: {e}"),
            SettingsSaveError::WriteTmp(e) => write!(f, "cannot write staged settings: {e}"),
            SettingsSaveError::Rename(e) => write!(f, "cannot replace settings file: {e}"),
        }
    }
}

impl std::error::Error for SettingsSaveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsSaveError::Serialize(e) => Some(e),
            SettingsSaveError::CreateDir(e) => Some(e),
            SettingsSaveError::WriteTmp(e) => Some(e),
            SettingsSaveError::Rename(e) => Some(e),
        }
    }
}

pub fn settings_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .or_else(|| std::env::var_os("APPDATA"))
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("SharePane").join("settings.json")
}

pub fn parse_settings_json(data: &str) -> Result<SavedSettings, serde_json::Error> {
    serde_json::from_str::<SavedSettings>(data)
}

pub fn load_settings_from_path(path: &Path) -> Result<SavedSettings, SettingsLoadError> {
    let meta = fs::metadata(path).map_err(SettingsLoadError::Metadata)?;
    if meta.len() > MAX_SETTINGS_BYTES {
        return Err(SettingsLoadError::TooLarge {
            size: meta.len(),
            max: MAX_SETTINGS_BYTES,
        });
    }

    let data = fs::read_to_string(path).map_err(SettingsLoadError::Read)?;
    parse_settings_json(&data).map_err(SettingsLoadError::Parse)
}

/// Loads settings, falling back to defaults when the file is absent or unusable.
pub fn load_settings(path: &Path) -> SavedSettings {
    match load_settings_from_path(path) {
        Ok(settings) => settings,
        Err(SettingsLoadError::Metadata(err)) if err.kind() == io::ErrorKind::NotFound => {
            SavedSettings::default()
        }
        Err(err) => {
            warn!(path = %path.display(), "ignoring settings file: {err}");
            SavedSettings::default()
        }
    }
}

pub fn save_settings_to_path(
    path: &Path,
    settings: &SavedSettings,
) -> Result<(), SettingsSaveError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(SettingsSaveError::CreateDir)?;
    }

    let tmp = path.with_extension("json.tmp");
    let payload = serde_json::to_string_pretty(settings).map_err(SettingsSaveError::Serialize)?;
    fs::write(&tmp, payload.as_bytes()).map_err(SettingsSaveError::WriteTmp)?;

    if path.exists() {
        let _ = fs::remove_file(path);
    }

    fs::rename(&tmp, path).map_err(SettingsSaveError::Rename)?;
    Ok(())
}
