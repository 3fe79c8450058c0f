use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::Mode;

/// Default settings file name, next to the working directory
pub const SETTINGS_FILE: &str = "config.json";

/// Persisted user settings.
///
/// The core never reads this; callers load it, override it from their own
/// inputs and turn it into an [`crate::OrganizerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source: Option<PathBuf>,
    pub dest: Option<PathBuf>,
    pub mode: Mode,
    pub generate_report: bool,
    pub dark_mode: bool,
    pub report_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub extensions: Option<Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: None,
            dest: None,
            mode: Mode::Backup,
            generate_report: true,
            dark_mode: false,
            report_dir: None,
            concurrency: None,
            extensions: None,
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse settings file: {:?}", path))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let raw = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, raw).with_context(|| format!("Failed to write settings file: {:?}", path))
    }
}
