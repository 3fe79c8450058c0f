use crate::models::{CopyOutcome, Report, RunPlan, WorkItem, WorkKind};
use crate::services::aggregator::{Aggregator, EventSender, RunEvent};
use crate::utils::{copy_file_with_metadata, ensure_dir_all, Layout};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_CONCURRENCY: usize = 8;

/// Configuration for the copy worker pool
#[derive(Debug, Clone)]
pub struct CopyPoolConfig {
    pub destination_root: PathBuf,
    pub concurrency: usize,
    pub layout: Layout,
}

impl Default for CopyPoolConfig {
    fn default() -> Self {
        Self {
            destination_root: PathBuf::new(),
            concurrency: DEFAULT_CONCURRENCY,
            layout: Layout::Mirror,
        }
    }
}

/// Bounded pool of copy workers
#[derive(Debug, Clone)]
pub struct CopyPool {
    config: CopyPoolConfig,
}

impl CopyPool {
    pub fn new(config: CopyPoolConfig) -> Self {
        Self { config }
    }

    /// Effective number of workers; zero falls back to one
    pub fn concurrency(&self) -> usize {
        self.config.concurrency.max(1)
    }

    /// Dispatch every item and collect one outcome per dispatched item.
    ///
    /// `cancel` is checked before each dispatch; copies already running are
    /// left to finish.
    pub async fn run(
        &self,
        plan: RunPlan,
        cancel: &CancellationToken,
        events: &EventSender,
    ) -> Report {
        let RunPlan { items, sites, dirs } = plan;
        let total = items.len();
        events.emit(RunEvent::Started { total });

        let mirror = self.config.layout == Layout::Mirror;
        if mirror && !cancel.is_cancelled() {
            self.mirror_dirs(dirs).await;
        }

        let (done_tx, done_rx) = mpsc::unbounded_channel::<CopyOutcome>();
        let collector = tokio::spawn(Aggregator::new(total, events.clone()).collect(done_rx));

        let semaphore = Arc::new(Semaphore::new(self.concurrency()));
        let destination_root = Arc::new(self.config.destination_root.clone());
        let mut workers = JoinSet::new();
        let mut pending_sites = sites.into_iter();
        let mut current_site: Option<String> = None;
        let mut dispatched = 0usize;

        for item in items {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                break;
            };

            if mirror
                && !item.site_dir.is_empty()
                && current_site.as_deref() != Some(item.site_dir.as_str())
            {
                announce_sites_through(&mut pending_sites, &item.site_dir, events);
                current_site = Some(item.site_dir.clone());
            }

            let done_tx = done_tx.clone();
            let destination_root = Arc::clone(&destination_root);
            workers.spawn(async move {
                let outcome = execute_item(item, destination_root).await;
                drop(permit);
                let _ = done_tx.send(outcome);
            });
            dispatched += 1;
        }

        let cancelled = dispatched < total;
        if cancelled {
            warn!("Run cancelled after dispatching {}/{} items", dispatched, total);
            events.emit(RunEvent::Cancelled { dispatched, total });
        } else if mirror {
            // Trailing site folders with nothing to copy
            for site in pending_sites {
                announce_site(site, events);
            }
        }

        drop(done_tx);
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Copy worker failed: {}", e);
            }
        }

        match collector.await {
            Ok(aggregator) => aggregator.finish(cancelled),
            Err(e) => {
                error!("Result collector failed: {}", e);
                let mut report = Report::empty();
                report.total_items = total;
                report.cancelled = cancelled;
                report
            }
        }
    }

    /// Recreate the walked folder layout, empty folders included
    async fn mirror_dirs(&self, dirs: Vec<PathBuf>) {
        if dirs.is_empty() {
            return;
        }

        let root = self.config.destination_root.clone();
        let created = tokio::task::spawn_blocking(move || {
            dirs.iter()
                .filter(|dir| match ensure_dir_all(&root.join(dir)) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("{:#}", e);
                        false
                    }
                })
                .count()
        })
        .await;

        match created {
            Ok(count) => debug!("Mirrored {} folders", count),
            Err(e) => error!("Folder mirroring failed: {}", e),
        }
    }
}

fn announce_site(site: String, events: &EventSender) {
    info!("Processing site {}", site);
    events.emit(RunEvent::SiteStarted { site });
}

/// Announce pending sites up to and including `site_dir`
fn announce_sites_through<I>(pending: &mut I, site_dir: &str, events: &EventSender)
where
    I: Iterator<Item = String>,
{
    for site in pending.by_ref() {
        let reached = site == site_dir;
        announce_site(site, events);
        if reached {
            return;
        }
    }
}

/// Turn one work item into its outcome; never fails
async fn execute_item(item: WorkItem, destination_root: Arc<PathBuf>) -> CopyOutcome {
    match &item.kind {
        WorkKind::Skip(reason) => return CopyOutcome::skipped(&item, *reason),
        WorkKind::Unreadable(message) => return CopyOutcome::failed(&item, message.clone()),
        WorkKind::Copy => {}
    }

    let destination = item.destination(&destination_root);
    let source = item.source_path.clone();
    let target = destination.clone();

    match tokio::task::spawn_blocking(move || copy_file_with_metadata(&source, &target)).await {
        Ok(Ok(_)) => CopyOutcome::copied(&item, destination),
        Ok(Err(e)) => CopyOutcome::failed(&item, format!("{:#}", e)),
        Err(e) => CopyOutcome::failed(&item, format!("Copy task failed: {}", e)),
    }
}
