pub mod copy_outcome;
pub mod report;
pub mod settings;
pub mod work_item;

pub use copy_outcome::{CopyOutcome, CopyStatus};
pub use report::{Report, ReportBuilder};
pub use settings::{Settings, SETTINGS_FILE};
pub use work_item::{RunPlan, SkipReason, WorkItem, WorkKind};
