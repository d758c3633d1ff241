/// User settings
///
/// Defaults reproduce the folder layout the tools were written for
/// (`screws` -> `screws_clean`, renamed to `screw_<n>.jpeg`). A JSON file
/// can override any field:
/// - Linux: ~/.config/screw-prep/settings.json
/// - macOS: ~/Library/Application Support/screw-prep/settings.json
/// - Windows: %APPDATA%\screw-prep\settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cleanup::composite::BackgroundColor;
use crate::error::{Error, Result};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Folder with the original photos
    pub input_folder: PathBuf,
    /// Folder that receives the cleaned photos
    pub output_folder: PathBuf,
    /// Color the subject is composited onto
    pub background: BackgroundColor,
    /// U2-Net ONNX weights; None means the rembg default location
    pub model_path: Option<PathBuf>,
    /// Folder whose files get renamed
    pub rename_folder: PathBuf,
    pub rename_prefix: String,
    pub rename_extension: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_folder: PathBuf::from("screws"),
            output_folder: PathBuf::from("screws_clean"),
            background: BackgroundColor::WHITE,
            model_path: None,
            rename_folder: PathBuf::from("screws_clean"),
            rename_prefix: "screw".to_string(),
            rename_extension: "jpeg".to_string(),
        }
    }
}

impl Settings {
    /// Load settings.
    ///
    /// An explicit path must exist. Without one, the per-user settings file
    /// is used when present, otherwise the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Per-user settings file location
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("screw-prep");
        path.push("settings.json");
        Some(path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let settings = Self::from_json(&json).map_err(|source| Error::Settings {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("⚙️  Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Model path from settings, or the rembg default location
    pub fn resolved_model_path(&self) -> PathBuf {
        self.model_path
            .clone()
            .unwrap_or_else(crate::cleanup::matte::default_model_path)
    }
}
