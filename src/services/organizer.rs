use crate::error::ConfigError;
use crate::models::{Report, WorkKind};
use crate::services::aggregator::EventSender;
use crate::services::copy_pool::{CopyPool, CopyPoolConfig, DEFAULT_CONCURRENCY};
use crate::services::tree_walker::{Scan, SiteRoot, TreeWalker};
use crate::utils::Mode;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Configuration for a reorganization run
#[derive(Debug, Clone)]
pub struct OrganizerConfig {
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub mode: Mode,
    /// `None` uses the mode's default allow-list.
    pub extensions: Option<Vec<String>>,
    /// Folder names excluded on top of the mode's built-in set.
    pub extra_exclusions: Vec<String>,
    pub concurrency: usize,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::new(),
            destination_root: PathBuf::new(),
            mode: Mode::Backup,
            extensions: None,
            extra_exclusions: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl OrganizerConfig {
    /// Reject configurations no run could start from
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_dir(
            &self.source_root,
            ConfigError::MissingSource,
            ConfigError::SourceNotFound,
            ConfigError::SourceNotDirectory,
        )?;
        check_dir(
            &self.destination_root,
            ConfigError::MissingDestination,
            ConfigError::DestinationNotFound,
            ConfigError::DestinationNotDirectory,
        )
    }
}

fn check_dir(
    path: &Path,
    missing: ConfigError,
    not_found: fn(PathBuf) -> ConfigError,
    not_dir: fn(PathBuf) -> ConfigError,
) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(missing);
    }
    if !path.exists() {
        return Err(not_found(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(not_dir(path.to_path_buf()));
    }
    Ok(())
}

/// Result of the analyze pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub site_roots: Vec<SiteRoot>,
    pub total_items: usize,
    /// Items that would be copied, as opposed to skipped or unreadable.
    pub copyable: usize,
}

/// Opens a folder for the operator; the core only ever uses the no-op one
pub trait FolderOpener {
    fn open(&self, path: &Path);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOpener;

impl FolderOpener for NoopOpener {
    fn open(&self, _path: &Path) {}
}

/// Scan / Run / Cancel entry point for front ends
///
/// Clones share the cancellation handle, so a clone can stop a run started
/// from another one.
#[derive(Debug, Clone)]
pub struct Organizer {
    config: OrganizerConfig,
    /// Token of the current or next run; replaced once that run ends.
    cancel: Arc<Mutex<CancellationToken>>,
}

impl Organizer {
    pub fn new(config: OrganizerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
        })
    }

    fn token(&self) -> MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn walker(&self) -> TreeWalker {
        TreeWalker::new(
            &self.config.source_root,
            self.config.mode,
            self.config.extensions.clone(),
        )
        .with_extra_exclusions(&self.config.extra_exclusions)
    }

    /// Lazy walk of the source tree
    pub fn scan(&self) -> Result<Scan, ConfigError> {
        self.walker().scan()
    }

    /// List site folders and count what a run would process
    pub fn analyze(&self) -> Result<ScanSummary, ConfigError> {
        let walker = self.walker();
        let site_roots = match self.config.mode {
            Mode::Images => Vec::new(),
            Mode::Backup | Mode::ReportStructure => walker.site_roots()?,
        };

        let (total_items, copyable) = walker
            .scan()?
            .fold((0, 0), |(total, copyable), item| {
                (total + 1, copyable + usize::from(item.kind == WorkKind::Copy))
            });

        info!("Site folders detected: {}", site_roots.len());
        for root in &site_roots {
            info!(" - {}", root.name);
        }
        info!("Files to copy: {} of {} found", copyable, total_items);

        Ok(ScanSummary {
            site_roots,
            total_items,
            copyable,
        })
    }

    /// Walk, then copy everything found.
    ///
    /// Only configuration problems are returned as errors; once the walk has
    /// produced its items the caller always gets a complete report. A cancel
    /// issued before or during the run applies to this run only.
    pub async fn run(&self, events: EventSender) -> Result<Report, ConfigError> {
        let cancel = self.token().clone();
        let result = self.run_with(&cancel, events).await;

        let mut current = self.token();
        if current.is_cancelled() {
            *current = CancellationToken::new();
        }
        result
    }

    async fn run_with(
        &self,
        cancel: &CancellationToken,
        events: EventSender,
    ) -> Result<Report, ConfigError> {
        self.config.validate()?;

        info!(
            "Scanning {} in {} mode",
            self.config.source_root.display(),
            self.config.mode
        );
        let plan = self.scan()?.into_plan();
        info!(
            "{} items found in {} site folders",
            plan.items.len(),
            plan.sites.len()
        );

        let pool = CopyPool::new(CopyPoolConfig {
            destination_root: self.config.destination_root.clone(),
            concurrency: self.config.concurrency,
            layout: self.config.mode.layout(),
        });

        let report = pool.run(plan, cancel, &events).await;
        info!("{}", report);
        Ok(report)
    }

    /// Stop dispatching new items; copies already running finish
    pub fn cancel(&self) {
        self.token().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token().is_cancelled()
    }
}
