use crate::models::Report;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

pub const ROW_HEADERS: [&str; 5] = ["File", "Source path", "Destination path", "Site ID", "Status"];

/// One row of the flat copy report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub file_name: String,
    pub source_path: String,
    pub dest_path: String,
    pub site_id: String,
    pub status: String,
}

impl ReportRow {
    pub fn cells(&self) -> [&str; 5] {
        [
            &self.file_name,
            &self.source_path,
            &self.dest_path,
            &self.site_id,
            &self.status,
        ]
    }
}

/// Failed item with its message, for remediation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRow {
    pub source_path: String,
    pub site_id: String,
    pub message: String,
    pub timestamp: String,
}

/// Summary block of a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryTable {
    pub total_copied: usize,
    pub unique_sites: usize,
    pub status_counts: Vec<(String, usize)>,
    pub per_site: Vec<(String, usize)>,
    pub per_secondary: Vec<(String, String, usize)>,
}

/// Sink-independent rendering of a [`Report`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTable {
    pub rows: Vec<ReportRow>,
    pub failures: Vec<FailureRow>,
    pub summary: SummaryTable,
}

impl From<&Report> for ReportTable {
    fn from(report: &Report) -> Self {
        let rows = report
            .outcomes
            .iter()
            .map(|o| ReportRow {
                file_name: o.file_name.clone(),
                source_path: o.source_path.to_string_lossy().into_owned(),
                dest_path: o.dest_display(),
                site_id: o.site_id.clone(),
                status: o.status.to_string(),
            })
            .collect();

        let failures = report
            .failures()
            .map(|o| FailureRow {
                source_path: o.source_path.to_string_lossy().into_owned(),
                site_id: o.site_id.clone(),
                message: o.status.error_message().unwrap_or_default().to_string(),
                timestamp: o.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
            })
            .collect();

        let summary = SummaryTable {
            total_copied: report.copied_count,
            unique_sites: report.unique_sites(),
            status_counts: report
                .status_counts()
                .into_iter()
                .map(|(label, count)| (label.to_string(), count))
                .collect(),
            per_site: report
                .per_site
                .iter()
                .map(|(site, count)| (site.clone(), *count))
                .collect(),
            per_secondary: report
                .per_secondary
                .iter()
                .map(|((site, secondary), count)| (site.clone(), secondary.clone(), *count))
                .collect(),
        };

        Self {
            rows,
            failures,
            summary,
        }
    }
}

/// Timestamp used in report file names; millisecond resolution keeps
/// repeated runs apart
pub fn run_stamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// Destination of a rendered report
pub trait ReportSink {
    /// Write the table and return the files created
    fn emit(&self, table: &ReportTable, stamp: &str) -> Result<Vec<PathBuf>>;
}

/// Two delimited files: the flat table and the summary
#[derive(Debug, Clone)]
pub struct CsvSink {
    directory: PathBuf,
}

impl CsvSink {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn write_rows(&self, path: &Path, table: &ReportTable) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create report file: {:?}", path))?;
        writer.write_record(ROW_HEADERS)?;
        for row in &table.rows {
            writer.write_record(row.cells())?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_summary(&self, path: &Path, summary: &SummaryTable) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to create summary file: {:?}", path))?;

        writer.write_record(["Summary"])?;
        writer.write_record(["Total copied", summary.total_copied.to_string().as_str()])?;
        writer.write_record(["Unique sites", summary.unique_sites.to_string().as_str()])?;
        for (label, count) in &summary.status_counts {
            writer.write_record([label.as_str(), count.to_string().as_str()])?;
        }

        writer.write_record([""])?;
        writer.write_record(["Site ID", "Count"])?;
        for (site, count) in &summary.per_site {
            writer.write_record([site.as_str(), count.to_string().as_str()])?;
        }

        writer.write_record([""])?;
        writer.write_record(["Site ID", "Secondary ID", "Count"])?;
        for (site, secondary, count) in &summary.per_secondary {
            writer.write_record([site.as_str(), secondary.as_str(), count.to_string().as_str()])?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl ReportSink for CsvSink {
    fn emit(&self, table: &ReportTable, stamp: &str) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.directory)
            .with_context(|| format!("Failed to create directory: {:?}", self.directory))?;

        let rows_path = self.directory.join(format!("copy_report_{}.csv", stamp));
        let summary_path = self.directory.join(format!("copy_summary_{}.csv", stamp));
        self.write_rows(&rows_path, table)?;
        self.write_summary(&summary_path, &table.summary)?;

        Ok(vec![rows_path, summary_path])
    }
}

/// Workbook with the flat table, the summary and the not-copied list
#[derive(Debug, Clone)]
pub struct XlsxSink {
    directory: PathBuf,
}

impl XlsxSink {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x4F81BD))
}

fn cast_row(idx: usize) -> Result<u32> {
    u32::try_from(idx).context("Row index exceeds worksheet limits")
}

fn write_header(sheet: &mut Worksheet, row: usize, headers: &[&str], format: &Format) -> Result<()> {
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(cast_row(row)?, col as u16, *header, format)?;
    }
    Ok(())
}

fn rows_sheet(table: &ReportTable, format: &Format) -> Result<Worksheet> {
    let mut sheet = Worksheet::new();
    sheet.set_name("copy_report")?;
    write_header(&mut sheet, 0, &ROW_HEADERS, format)?;
    for (idx, row) in table.rows.iter().enumerate() {
        for (col, cell) in row.cells().iter().enumerate() {
            sheet.write_string(cast_row(idx + 1)?, col as u16, *cell)?;
        }
    }
    sheet.autofit();
    Ok(sheet)
}

fn summary_sheet(summary: &SummaryTable, format: &Format) -> Result<Worksheet> {
    let mut sheet = Worksheet::new();
    sheet.set_name("summary")?;

    let mut row = 0usize;
    sheet.write_string_with_format(0, 0, "Summary", format)?;
    row += 1;
    let mut totals = vec![
        ("Total copied".to_string(), summary.total_copied),
        ("Unique sites".to_string(), summary.unique_sites),
    ];
    totals.extend(summary.status_counts.iter().cloned());
    for (label, count) in totals {
        sheet.write_string(cast_row(row)?, 0, label)?;
        sheet.write_number(cast_row(row)?, 1, count as f64)?;
        row += 1;
    }

    row += 1;
    write_header(&mut sheet, row, &["Site ID", "Count"], format)?;
    row += 1;
    for (site, count) in &summary.per_site {
        sheet.write_string(cast_row(row)?, 0, site)?;
        sheet.write_number(cast_row(row)?, 1, *count as f64)?;
        row += 1;
    }

    row += 1;
    write_header(&mut sheet, row, &["Site ID", "Secondary ID", "Count"], format)?;
    row += 1;
    for (site, secondary, count) in &summary.per_secondary {
        sheet.write_string(cast_row(row)?, 0, site)?;
        sheet.write_string(cast_row(row)?, 1, secondary)?;
        sheet.write_number(cast_row(row)?, 2, *count as f64)?;
        row += 1;
    }

    sheet.autofit();
    Ok(sheet)
}

fn failures_sheet(failures: &[FailureRow], format: &Format) -> Result<Worksheet> {
    let mut sheet = Worksheet::new();
    sheet.set_name("not_copied")?;
    write_header(&mut sheet, 0, &["Source path", "Site ID", "Reason", "Date"], format)?;
    for (idx, failure) in failures.iter().enumerate() {
        let row = cast_row(idx + 1)?;
        sheet.write_string(row, 0, &failure.source_path)?;
        sheet.write_string(row, 1, &failure.site_id)?;
        sheet.write_string(row, 2, &failure.message)?;
        sheet.write_string(row, 3, &failure.timestamp)?;
    }
    sheet.autofit();
    Ok(sheet)
}

impl ReportSink for XlsxSink {
    fn emit(&self, table: &ReportTable, stamp: &str) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.directory)
            .with_context(|| format!("Failed to create directory: {:?}", self.directory))?;

        let path = self.directory.join(format!("copy_report_{}.xlsx", stamp));
        let format = header_format();

        let mut workbook = Workbook::new();
        workbook.push_worksheet(rows_sheet(table, &format)?);
        workbook.push_worksheet(summary_sheet(&table.summary, &format)?);
        workbook.push_worksheet(failures_sheet(&table.failures, &format)?);
        workbook
            .save(&path)
            .with_context(|| format!("Failed to write workbook: {:?}", path))?;

        Ok(vec![path])
    }
}

/// Which sinks a run writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    Csv,
    Xlsx,
    #[default]
    Both,
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "xlsx" | "excel" => Ok(ReportFormat::Xlsx),
            "both" => Ok(ReportFormat::Both),
            other => anyhow::bail!("Invalid report format: {}", other),
        }
    }
}

/// Configuration for report persistence
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub enabled: bool,
    pub format: ReportFormat,
    /// Defaults to `<destination>/reports`.
    pub directory: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: ReportFormat::Both,
            directory: None,
        }
    }
}

impl ReportConfig {
    pub fn directory_for(&self, destination_root: &Path) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| destination_root.join("reports"))
    }

    /// Sinks selected by this configuration; empty when reporting is off
    pub fn sinks(&self, destination_root: &Path) -> Vec<Box<dyn ReportSink + Send + Sync>> {
        if !self.enabled {
            return Vec::new();
        }

        let directory = self.directory_for(destination_root);
        let mut sinks: Vec<Box<dyn ReportSink + Send + Sync>> = Vec::new();
        if matches!(self.format, ReportFormat::Csv | ReportFormat::Both) {
            sinks.push(Box::new(CsvSink::new(&directory)));
        }
        if matches!(self.format, ReportFormat::Xlsx | ReportFormat::Both) {
            sinks.push(Box::new(XlsxSink::new(&directory)));
        }
        sinks
    }
}

/// Render a report through every sink, stamping all files alike
pub fn emit_report(report: &Report, sinks: &[Box<dyn ReportSink + Send + Sync>]) -> Result<Vec<PathBuf>> {
    let table = ReportTable::from(report);
    let stamp = run_stamp(Local::now());

    let mut written = Vec::new();
    for sink in sinks {
        let mut paths = sink.emit(&table, &stamp)?;
        for path in &paths {
            info!("Report written: {}", path.display());
        }
        written.append(&mut paths);
    }
    Ok(written)
}
