pub mod exclusion;
pub mod file_operations;
pub mod identifier;

pub use exclusion::{ExclusionSet, Layout, Mode};
pub use file_operations::{
    copy_file_with_metadata, ensure_dir_all, is_system_junk, matches_extensions,
};
pub use identifier::{extract_secondary_id, extract_site_id, site_root_id};
