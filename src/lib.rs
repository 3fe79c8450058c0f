pub mod error;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use error::ConfigError;
pub use models::{
    CopyOutcome, CopyStatus, Report, RunPlan, Settings, SkipReason, WorkItem, WorkKind,
};
pub use services::{
    emit_report, EventSender, Organizer, OrganizerConfig, ReportConfig, ReportFormat, RunEvent,
    ScanSummary, TreeWalker,
};
pub use utils::{ExclusionSet, Layout, Mode};

// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub organizer: OrganizerConfig,
    pub report: ReportConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            organizer: OrganizerConfig::default(),
            report: ReportConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Start from persisted settings; command-line values are applied on top
    pub fn from_settings(settings: &Settings) -> Self {
        let mut config = Self::default();
        if let Some(source) = &settings.source {
            config.organizer.source_root = source.clone();
        }
        if let Some(dest) = &settings.dest {
            config.organizer.destination_root = dest.clone();
        }
        config.organizer.mode = settings.mode;
        config.organizer.extensions = settings.extensions.clone();
        if let Some(concurrency) = settings.concurrency {
            config.organizer.concurrency = concurrency;
        }
        config.report.enabled = settings.generate_report;
        config.report.directory = settings.report_dir.clone();
        config
    }

    /// Settings blob reflecting this configuration, keeping caller-only fields
    pub fn to_settings(&self, previous: &Settings) -> Settings {
        let path_or_none = |p: &std::path::Path| (!p.as_os_str().is_empty()).then(|| p.to_path_buf());
        Settings {
            source: path_or_none(&self.organizer.source_root),
            dest: path_or_none(&self.organizer.destination_root),
            mode: self.organizer.mode,
            generate_report: self.report.enabled,
            dark_mode: previous.dark_mode,
            report_dir: self.report.directory.clone(),
            concurrency: Some(self.organizer.concurrency),
            extensions: self.organizer.extensions.clone(),
        }
    }
}
