use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

use super::copy_outcome::{CopyOutcome, CopyStatus};
use crate::utils::extract_secondary_id;

/// Report of one run: outcomes in completion order plus derived aggregates
#[derive(Debug, Clone)]
pub struct Report {
    pub outcomes: Vec<CopyOutcome>,
    /// Items produced by the walk for this run.
    pub total_items: usize,
    pub copied_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    /// Outcomes per site identifier.
    pub per_site: BTreeMap<String, usize>,
    /// Outcomes per (site identifier, excavation batch).
    pub per_secondary: BTreeMap<(String, String), usize>,
    pub cancelled: bool,
    /// Items never handed to a worker because the run was cancelled.
    pub not_dispatched: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Report {
    pub fn empty() -> Self {
        ReportBuilder::new(0).build(false)
    }

    /// Aggregate a finished list of outcomes
    pub fn from_outcomes(outcomes: Vec<CopyOutcome>) -> Self {
        let mut builder = ReportBuilder::new(outcomes.len());
        for outcome in outcomes {
            builder.record(outcome);
        }
        builder.build(false)
    }

    pub fn total_processed(&self) -> usize {
        self.copied_count + self.skipped_count + self.error_count
    }

    pub fn unique_sites(&self) -> usize {
        self.per_site.len()
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.total_processed();
        if total == 0 {
            0.0
        } else {
            self.copied_count as f64 / total as f64
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &CopyOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_error())
    }

    /// Count per status label, in a fixed order
    pub fn status_counts(&self) -> Vec<(&'static str, usize)> {
        let labels = [
            CopyStatus::Copied.label(),
            CopyStatus::SkippedInvalidExtension.label(),
            CopyStatus::SkippedNoIdentifier.label(),
            CopyStatus::SkippedSystemJunk.label(),
            CopyStatus::Error(String::new()).label(),
        ];
        labels
            .into_iter()
            .map(|label| {
                let count = self
                    .outcomes
                    .iter()
                    .filter(|o| o.status.label() == label)
                    .count();
                (label, count)
            })
            .collect()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[RUN] items={} copied={} skipped={} errors={} sites={}",
            self.total_items,
            self.copied_count,
            self.skipped_count,
            self.error_count,
            self.unique_sites()
        )?;
        if self.cancelled {
            write!(f, " cancelled (not dispatched={})", self.not_dispatched)?;
        }
        Ok(())
    }
}

/// Mutable accumulator, owned by a single writer
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    total_items: usize,
    outcomes: Vec<CopyOutcome>,
    copied_count: usize,
    skipped_count: usize,
    error_count: usize,
    per_site: BTreeMap<String, usize>,
    per_secondary: BTreeMap<(String, String), usize>,
    started_at: DateTime<Utc>,
}

impl ReportBuilder {
    pub fn new(total_items: usize) -> Self {
        Self {
            total_items,
            outcomes: Vec::with_capacity(total_items),
            copied_count: 0,
            skipped_count: 0,
            error_count: 0,
            per_site: BTreeMap::new(),
            per_secondary: BTreeMap::new(),
            started_at: Utc::now(),
        }
    }

    pub fn record(&mut self, outcome: CopyOutcome) {
        match &outcome.status {
            CopyStatus::Copied => self.copied_count += 1,
            CopyStatus::Error(_) => self.error_count += 1,
            _ => self.skipped_count += 1,
        }

        if !outcome.site_id.is_empty() {
            *self.per_site.entry(outcome.site_id.clone()).or_insert(0) += 1;

            if let Some(secondary) = extract_secondary_id(&outcome.file_name) {
                *self
                    .per_secondary
                    .entry((outcome.site_id.clone(), secondary.to_string()))
                    .or_insert(0) += 1;
            }
        }

        self.outcomes.push(outcome);
    }

    /// Finalize into an immutable report
    pub fn build(self, cancelled: bool) -> Report {
        let not_dispatched = self.total_items.saturating_sub(self.outcomes.len());
        Report {
            outcomes: self.outcomes,
            total_items: self.total_items,
            copied_count: self.copied_count,
            skipped_count: self.skipped_count,
            error_count: self.error_count,
            per_site: self.per_site,
            per_secondary: self.per_secondary,
            cancelled,
            not_dispatched: if cancelled { not_dispatched } else { 0 },
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
