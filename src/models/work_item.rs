use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Why a file was seen by the walk but not copied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    InvalidExtension,
    NoIdentifier,
    SystemJunk,
}

/// What a worker has to do with an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkKind {
    Copy,
    Skip(SkipReason),
    /// A directory that could not be listed during the walk.
    Unreadable(String),
}

/// One unit of work produced by the tree walker - consumed exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub source_path: PathBuf,
    /// Path below `site_dir` in the destination tree.
    pub relative_path: PathBuf,
    /// Normalized site identifier, empty when none could be derived.
    pub site_id: String,
    /// Destination folder directly under the destination root.
    pub site_dir: String,
    pub kind: WorkKind,
}

impl WorkItem {
    pub fn copy(
        source_path: PathBuf,
        relative_path: PathBuf,
        site_id: String,
        site_dir: String,
    ) -> Self {
        Self {
            source_path,
            relative_path,
            site_id,
            site_dir,
            kind: WorkKind::Copy,
        }
    }

    pub fn skip(source_path: PathBuf, site_id: String, site_dir: String, reason: SkipReason) -> Self {
        Self {
            source_path,
            relative_path: PathBuf::new(),
            site_id,
            site_dir,
            kind: WorkKind::Skip(reason),
        }
    }

    pub fn unreadable(source_path: PathBuf, site_dir: String, message: String) -> Self {
        Self {
            source_path,
            relative_path: PathBuf::new(),
            site_id: String::new(),
            site_dir,
            kind: WorkKind::Unreadable(message),
        }
    }

    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// `destination_root / site_dir / relative_path`
    pub fn destination(&self, destination_root: &Path) -> PathBuf {
        destination_root.join(&self.site_dir).join(&self.relative_path)
    }

    pub fn is_copy(&self) -> bool {
        matches!(self.kind, WorkKind::Copy)
    }
}

/// Everything one run dispatches, in walk order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunPlan {
    pub items: Vec<WorkItem>,
    /// Site folders in walk order, including ones with nothing to copy.
    pub sites: Vec<String>,
    /// Folders to recreate, relative to the destination root.
    pub dirs: Vec<PathBuf>,
}

impl RunPlan {
    /// Plan with sites taken from the items themselves and no folders to mirror
    pub fn from_items(items: Vec<WorkItem>) -> Self {
        let mut sites: Vec<String> = Vec::new();
        for item in &items {
            if !item.site_dir.is_empty() && !sites.contains(&item.site_dir) {
                sites.push(item.site_dir.clone());
            }
        }
        Self {
            items,
            sites,
            dirs: Vec::new(),
        }
    }
}
