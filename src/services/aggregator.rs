use crate::models::{CopyOutcome, CopyStatus, Report, ReportBuilder};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::warn;

/// Events streamed to the caller while a run is in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// The walk finished and `total` items are about to be dispatched.
    Started { total: usize },
    /// First item of a site folder is about to be dispatched.
    SiteStarted { site: String },
    Progress { completed: usize, total: usize },
    Failure { source: PathBuf, message: String },
    Cancelled { dispatched: usize, total: usize },
    Finished {
        copied: usize,
        skipped: usize,
        errors: usize,
    },
}

impl RunEvent {
    /// Whole-number percentage for progress events
    pub fn percent(&self) -> Option<u8> {
        match self {
            RunEvent::Progress { completed, total } if *total > 0 => {
                Some(((*completed as f64 / *total as f64) * 100.0) as u8)
            }
            RunEvent::Progress { .. } => Some(0),
            _ => None,
        }
    }
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::Started { total } => write!(f, "{} items to process", total),
            RunEvent::SiteStarted { site } => write!(f, "Processing site {}", site),
            RunEvent::Progress { completed, total } => write!(
                f,
                "Progress: {}% ({}/{})",
                self.percent().unwrap_or(0),
                completed,
                total
            ),
            RunEvent::Failure { source, message } => {
                write!(f, "Error copying {}: {}", source.display(), message)
            }
            RunEvent::Cancelled { dispatched, total } => {
                write!(f, "Cancelled after dispatching {}/{} items", dispatched, total)
            }
            RunEvent::Finished {
                copied,
                skipped,
                errors,
            } => write!(
                f,
                "Finished: {} copied, {} skipped, {} errors",
                copied, skipped, errors
            ),
        }
    }
}

/// Sending half of the caller's event stream.
///
/// Unbounded so a slow consumer never holds up the copy workers; a dropped
/// receiver just discards events.
#[derive(Debug, Clone, Default)]
pub struct EventSender(Option<mpsc::UnboundedSender<RunEvent>>);

impl EventSender {
    pub fn new(tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        Self(Some(tx))
    }

    /// Sender that drops every event
    pub fn none() -> Self {
        Self(None)
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}

/// Single writer of the run's counters and outcome list.
///
/// Workers never touch it directly; they send outcomes over a completion
/// channel drained by [`Aggregator::collect`].
#[derive(Debug)]
pub struct Aggregator {
    builder: ReportBuilder,
    completed: usize,
    total: usize,
    events: EventSender,
}

impl Aggregator {
    pub fn new(total: usize, events: EventSender) -> Self {
        Self {
            builder: ReportBuilder::new(total),
            completed: 0,
            total,
            events,
        }
    }

    pub fn record(&mut self, outcome: CopyOutcome) {
        if let CopyStatus::Error(message) = &outcome.status {
            warn!("Error copying {}: {}", outcome.source_path.display(), message);
            self.events.emit(RunEvent::Failure {
                source: outcome.source_path.clone(),
                message: message.clone(),
            });
        }

        self.builder.record(outcome);
        self.completed += 1;
        self.events.emit(RunEvent::Progress {
            completed: self.completed,
            total: self.total,
        });
    }

    /// `(completed, total)`
    pub fn progress(&self) -> (usize, usize) {
        (self.completed, self.total)
    }

    /// Drain the completion channel until every sender is gone
    pub async fn collect(mut self, mut completions: mpsc::UnboundedReceiver<CopyOutcome>) -> Self {
        while let Some(outcome) = completions.recv().await {
            self.record(outcome);
        }
        self
    }

    pub fn finish(self, cancelled: bool) -> Report {
        let report = self.builder.build(cancelled);
        self.events.emit(RunEvent::Finished {
            copied: report.copied_count,
            skipped: report.skipped_count,
            errors: report.error_count,
        });
        report
    }
}
