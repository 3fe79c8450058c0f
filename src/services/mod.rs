pub mod aggregator;
pub mod copy_pool;
pub mod organizer;
pub mod report_emitter;
pub mod tree_walker;

pub use aggregator::{Aggregator, EventSender, RunEvent};
pub use copy_pool::{CopyPool, CopyPoolConfig, DEFAULT_CONCURRENCY};
pub use organizer::{FolderOpener, NoopOpener, Organizer, OrganizerConfig, ScanSummary};
pub use report_emitter::{
    emit_report, run_stamp, CsvSink, ReportConfig, ReportFormat, ReportSink, ReportTable,
    XlsxSink,
};
pub use tree_walker::{Scan, SiteRoot, TreeWalker};
