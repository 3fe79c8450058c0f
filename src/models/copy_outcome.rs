use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::work_item::{SkipReason, WorkItem};

/// Copy outcome status enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyStatus {
    Copied,
    SkippedInvalidExtension,
    SkippedNoIdentifier,
    SkippedSystemJunk,
    Error(String),
}

impl From<SkipReason> for CopyStatus {
    fn from(reason: SkipReason) -> Self {
        match reason {
            SkipReason::InvalidExtension => CopyStatus::SkippedInvalidExtension,
            SkipReason::NoIdentifier => CopyStatus::SkippedNoIdentifier,
            SkipReason::SystemJunk => CopyStatus::SkippedSystemJunk,
        }
    }
}

impl CopyStatus {
    /// Stable label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            CopyStatus::Copied => "COPIED",
            CopyStatus::SkippedInvalidExtension => "SKIPPED_INVALID_EXTENSION",
            CopyStatus::SkippedNoIdentifier => "SKIPPED_NO_IDENTIFIER",
            CopyStatus::SkippedSystemJunk => "SKIPPED_SYSTEM_JUNK",
            CopyStatus::Error(_) => "ERROR",
        }
    }

    pub fn is_copied(&self) -> bool {
        matches!(self, CopyStatus::Copied)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            CopyStatus::SkippedInvalidExtension
                | CopyStatus::SkippedNoIdentifier
                | CopyStatus::SkippedSystemJunk
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CopyStatus::Error(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            CopyStatus::Error(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyStatus::Error(message) => write!(f, "ERROR: {}", message),
            other => f.write_str(other.label()),
        }
    }
}

/// Result of one work item - immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyOutcome {
    pub file_name: String,
    pub source_path: PathBuf,
    /// Set only when the file was copied.
    pub dest_path: Option<PathBuf>,
    /// Empty for skipped items and unreadable directories.
    pub site_id: String,
    pub status: CopyStatus,
    pub timestamp: DateTime<Utc>,
}

impl CopyOutcome {
    pub fn copied(item: &WorkItem, dest_path: PathBuf) -> Self {
        Self {
            file_name: item.file_name(),
            source_path: item.source_path.clone(),
            dest_path: Some(dest_path),
            site_id: item.site_id.clone(),
            status: CopyStatus::Copied,
            timestamp: Utc::now(),
        }
    }

    pub fn skipped(item: &WorkItem, reason: SkipReason) -> Self {
        Self {
            file_name: item.file_name(),
            source_path: item.source_path.clone(),
            dest_path: None,
            site_id: String::new(),
            status: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn failed(item: &WorkItem, message: String) -> Self {
        Self {
            file_name: item.file_name(),
            source_path: item.source_path.clone(),
            dest_path: None,
            site_id: item.site_id.clone(),
            status: CopyStatus::Error(message),
            timestamp: Utc::now(),
        }
    }

    pub fn dest_display(&self) -> String {
        self.dest_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> WorkItem {
        WorkItem::copy(
            PathBuf::from("/src/T2_00042/T2_00042_001_0000007.jpg"),
            PathBuf::from("T2_00042_001_0000007.jpg"),
            "T2_00042".to_string(),
            "T2_00042".to_string(),
        )
    }

    #[test]
    fn test_status_labels_and_predicates() {
        assert_eq!(CopyStatus::Copied.label(), "COPIED");
        assert!(CopyStatus::SkippedSystemJunk.is_skipped());
        assert!(!CopyStatus::Copied.is_skipped());
        let err = CopyStatus::Error("disk full".to_string());
        assert!(err.is_error());
        assert_eq!(err.error_message(), Some("disk full"));
        assert_eq!(err.to_string(), "ERROR: disk full");
    }

    #[test]
    fn test_skip_reason_maps_to_status() {
        assert_eq!(
            CopyStatus::from(SkipReason::NoIdentifier),
            CopyStatus::SkippedNoIdentifier
        );
        assert_eq!(
            CopyStatus::from(SkipReason::InvalidExtension),
            CopyStatus::SkippedInvalidExtension
        );
    }

    #[test]
    fn test_constructors() {
        let copied = CopyOutcome::copied(&item(), PathBuf::from("/dst/T2_00042/x.jpg"));
        assert_eq!(copied.file_name, "T2_00042_001_0000007.jpg");
        assert_eq!(copied.site_id, "T2_00042");
        assert_eq!(copied.dest_display(), "/dst/T2_00042/x.jpg");

        let skipped = CopyOutcome::skipped(&item(), SkipReason::SystemJunk);
        assert!(skipped.site_id.is_empty());
        assert!(skipped.dest_path.is_none());

        let failed = CopyOutcome::failed(&item(), "boom".to_string());
        assert_eq!(failed.site_id, "T2_00042");
        assert_eq!(failed.dest_display(), "");
    }
}
