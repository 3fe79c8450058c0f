use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

use crate::error::ConfigError;

/// Operating mode: selects the exclusion set and the destination layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Full backup of every site folder.
    #[default]
    #[serde(alias = "respaldo")]
    Backup,
    /// Report folder structure, without generated products.
    #[serde(alias = "informes")]
    ReportStructure,
    /// Images from anywhere in the tree, grouped by the id in their file name.
    Images,
}

/// How a source file maps onto the destination tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `destination/<site folder>/<path inside the site folder>`
    Mirror,
    /// `destination/<site id>/<file name>`
    Flatten,
}

impl Mode {
    pub fn layout(self) -> Layout {
        match self {
            Mode::Backup | Mode::ReportStructure => Layout::Mirror,
            Mode::Images => Layout::Flatten,
        }
    }

    /// Extension allow-list applied when the caller configures none
    pub fn default_extensions(self) -> Option<Vec<String>> {
        match self {
            Mode::Images => Some(
                ["jpg", "jpeg", "png", "tif", "tiff"]
                    .iter()
                    .map(|ext| ext.to_string())
                    .collect(),
            ),
            Mode::Backup | Mode::ReportStructure => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Backup => "backup",
            Mode::ReportStructure => "report-structure",
            Mode::Images => "images",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backup" | "respaldo" => Ok(Mode::Backup),
            "report-structure" | "informes" => Ok(Mode::ReportStructure),
            "images" => Ok(Mode::Images),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

const BACKUP_EXCLUSIONS: &[&str] = &[
    "PROYECTO AGISOFT",
    "FOTOS DE PROCESAMIENTO",
    "FOTOS DE REGISTRO",
    "FOTOS PROCESAMIENTO",
    "FOTOS REGISTRO",
    "PUNTOS DE CONTROL",
];

const REPORT_STRUCTURE_EXCLUSIONS: &[&str] = &["PRODUCTOS GENERADOS", "PROYECTO AGISOFT"];

/// Folder names whose whole subtree is left out of a walk.
///
/// Names are stored upper-cased; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    names: BTreeSet<String>,
}

impl ExclusionSet {
    /// Built-in set for a mode
    pub fn for_mode(mode: Mode) -> Self {
        let names: &[&str] = match mode {
            Mode::Backup => BACKUP_EXCLUSIONS,
            Mode::ReportStructure => REPORT_STRUCTURE_EXCLUSIONS,
            Mode::Images => &[],
        };
        Self::from_names(names.iter().copied())
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        set.extend(names);
        set
    }

    /// Add caller-configured names on top of the built-in ones
    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.names.extend(
            names
                .into_iter()
                .map(|name| name.as_ref().trim().to_uppercase())
                .filter(|name| !name.is_empty()),
        );
    }

    pub fn contains(&self, segment: &str) -> bool {
        self.names.contains(&segment.to_uppercase())
    }

    /// True iff any segment is an excluded folder name
    pub fn is_excluded<I, S>(&self, segments: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        segments.into_iter().any(|segment| self.contains(segment.as_ref()))
    }

    /// Check a directory path given relative to its site folder
    pub fn is_excluded_path(&self, relative_dir: &Path) -> bool {
        self.is_excluded(relative_dir.components().filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        }))
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
