use anyhow::{Context, Result};
use filetime::FileTime;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Marker prefix of sidecar files written by macOS on foreign filesystems
pub const JUNK_PREFIX: &str = "._";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Check if a file name is a foreign-OS sidecar artifact
/// Pure function
pub fn is_system_junk(file_name: &str) -> bool {
    file_name.starts_with(JUNK_PREFIX)
}

/// Check if file matches any of the given extensions
/// Pure function; an empty list matches everything
pub fn matches_extensions(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }

    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            extensions.iter().any(|target_ext| {
                target_ext
                    .trim_start_matches('.')
                    .eq_ignore_ascii_case(ext)
            })
        })
        .unwrap_or(false)
}

/// Create a directory and its parents.
///
/// Another worker creating the same directory concurrently is not an error.
pub fn ensure_dir_all(dir: &Path) -> Result<()> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to create directory: {:?}", dir)),
    }
}

/// Copy one file, keeping its modification time, and overwrite whatever is
/// at `destination`.
///
/// Bytes land in a temporary sibling first and are renamed into place, so two
/// workers targeting the same destination never interleave their writes; the
/// last rename wins.
pub fn copy_file_with_metadata<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    destination: Q,
) -> Result<u64> {
    let src_path = source.as_ref();
    let dest_path = destination.as_ref();

    let metadata = fs::metadata(src_path)
        .with_context(|| format!("Failed to read metadata for: {:?}", src_path))?;

    if !metadata.is_file() {
        anyhow::bail!("Source is not a regular file: {:?}", src_path);
    }

    let parent = dest_path
        .parent()
        .with_context(|| format!("Destination has no parent directory: {:?}", dest_path))?;
    ensure_dir_all(parent)?;

    let temp_path = temp_sibling(dest_path);
    let result = copy_then_rename(src_path, &temp_path, dest_path, &metadata);

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn copy_then_rename(
    src_path: &Path,
    temp_path: &Path,
    dest_path: &Path,
    metadata: &fs::Metadata,
) -> Result<u64> {
    let bytes = fs::copy(src_path, temp_path)
        .with_context(|| format!("Failed to copy file from {:?} to {:?}", src_path, dest_path))?;

    let modified = FileTime::from_last_modification_time(metadata);
    filetime::set_file_mtime(temp_path, modified)
        .with_context(|| format!("Failed to set modification time on {:?}", dest_path))?;

    fs::rename(temp_path, dest_path)
        .with_context(|| format!("Failed to move copied file into place: {:?}", dest_path))?;

    Ok(bytes)
}

/// Hidden sibling with a fixed-length name, so long destination names still fit
fn temp_sibling(dest_path: &Path) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    dest_path.with_file_name(format!(".{}-{}.partial", std::process::id(), n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_matches_extensions() {
        let path = Path::new("test.txt");
        let extensions = vec![".txt".to_string(), "log".to_string()];
        assert!(matches_extensions(path, &extensions));

        let extensions = vec![".pdf".to_string()];
        assert!(!matches_extensions(path, &extensions));
    }

    #[test]
    fn test_matches_extensions_case_insensitive() {
        let path = Path::new("test.JPG");
        let extensions = vec!["jpg".to_string()];
        assert!(matches_extensions(path, &extensions));
    }

    #[test]
    fn test_matches_extensions_without_extension() {
        assert!(!matches_extensions(Path::new("README"), &["md".to_string()]));
        assert!(matches_extensions(Path::new("README"), &[]));
    }

    #[test]
    fn test_is_system_junk() {
        assert!(is_system_junk("._a.jpg"));
        assert!(!is_system_junk(".hidden"));
        assert!(!is_system_junk("a._jpg"));
    }

    #[test]
    fn test_ensure_dir_all_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a/b/c");
        ensure_dir_all(&dir).unwrap();
        ensure_dir_all(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_ensure_dir_all_fails_on_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("occupied");
        fs::write(&file, b"x").unwrap();
        assert!(ensure_dir_all(&file.join("child")).is_err());
    }

    #[test]
    fn test_copy_preserves_mtime_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src.jpg");
        let dest = tmp.path().join("out/nested/dest.jpg");
        fs::write(&src, b"new content").unwrap();
        let mtime = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src, mtime).unwrap();

        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"old").unwrap();

        let bytes = copy_file_with_metadata(&src, &dest).unwrap();
        assert_eq!(bytes, 11);
        assert_eq!(fs::read(&dest).unwrap(), b"new content");

        let copied = fs::metadata(&dest).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&copied), mtime);

        let leftovers: Vec<_> = fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_copy_long_file_name() {
        let tmp = TempDir::new().unwrap();
        let name = format!("{}.jpg", "a".repeat(246));
        assert_eq!(name.len(), 250);
        let src = tmp.path().join("src").join(&name);
        let dest = tmp.path().join("out").join(&name);
        fs::create_dir_all(src.parent().unwrap()).unwrap();
        fs::write(&src, b"long").unwrap();

        copy_file_with_metadata(&src, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"long");
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let tmp = TempDir::new().unwrap();
        let err = copy_file_with_metadata(tmp.path().join("gone"), tmp.path().join("x"))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read metadata"));
    }

    #[test]
    fn test_copy_directory_source_fails() {
        let tmp = TempDir::new().unwrap();
        let err = copy_file_with_metadata(tmp.path(), tmp.path().join("x")).unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }
}
