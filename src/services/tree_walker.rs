use crate::error::ConfigError;
use crate::models::{RunPlan, SkipReason, WorkItem, WorkKind};
use crate::utils::{
    extract_site_id, is_system_junk, matches_extensions, site_root_id, ExclusionSet, Layout, Mode,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A top-level source folder whose name starts with a site identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRoot {
    pub path: PathBuf,
    /// Folder name as found on disk.
    pub name: String,
    /// Normalized identifier, e.g. `T1_00001`.
    pub site_id: String,
}

/// Enumerates work items under a source root.
///
/// Walking never touches the filesystem beyond listing and stat calls, and
/// each call to [`TreeWalker::scan`] is an independent walk.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    source_root: PathBuf,
    mode: Mode,
    exclusions: ExclusionSet,
    extensions: Vec<String>,
}

impl TreeWalker {
    /// Walker with the mode's built-in exclusion set; `None` extensions means
    /// the mode's default allow-list (which may allow everything)
    pub fn new<P: Into<PathBuf>>(source_root: P, mode: Mode, extensions: Option<Vec<String>>) -> Self {
        Self {
            source_root: source_root.into(),
            mode,
            exclusions: ExclusionSet::for_mode(mode),
            extensions: extensions
                .or_else(|| mode.default_extensions())
                .unwrap_or_default(),
        }
    }

    pub fn with_extra_exclusions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclusions.extend(names);
        self
    }

    /// Site folders directly under the source root, sorted by name
    pub fn site_roots(&self) -> Result<Vec<SiteRoot>, ConfigError> {
        let (roots, failures) = self.list_site_roots()?;
        for failure in &failures {
            if let WorkKind::Unreadable(message) = &failure.kind {
                warn!("Failed to list {}: {}", failure.source_path.display(), message);
            }
        }
        Ok(roots)
    }

    /// Site folders plus one unreadable item per entry that could not be listed
    fn list_site_roots(&self) -> Result<(Vec<SiteRoot>, Vec<WorkItem>), ConfigError> {
        let entries =
            fs::read_dir(&self.source_root).map_err(|source| ConfigError::SourceUnreadable {
                path: self.source_root.clone(),
                source,
            })?;

        Ok(collect_site_roots(
            &self.source_root,
            entries.map(|entry| entry.map(|e| e.path())),
        ))
    }

    /// Start a lazy walk
    pub fn scan(&self) -> Result<Scan, ConfigError> {
        let (roots, failures) = match self.mode.layout() {
            Layout::Mirror => {
                let (sites, failures) = self.list_site_roots()?;
                let roots = sites
                    .into_iter()
                    .map(|site| WalkRoot {
                        path: site.path.clone(),
                        site: Some(site),
                    })
                    .collect();
                (roots, failures)
            }
            Layout::Flatten => {
                if !self.source_root.is_dir() {
                    return Err(ConfigError::SourceNotDirectory(self.source_root.clone()));
                }
                let root = WalkRoot {
                    path: self.source_root.clone(),
                    site: None,
                };
                (vec![root], Vec::new())
            }
        };

        Ok(Scan {
            exclusions: self.exclusions.clone(),
            extensions: self.extensions.clone(),
            pending: failures.into_iter(),
            roots: roots.into_iter(),
            current: None,
            sites: Vec::new(),
            dirs: Vec::new(),
        })
    }

    /// Full counting pass
    pub fn count(&self) -> Result<usize, ConfigError> {
        Ok(self.scan()?.count())
    }
}

/// Split listed entries of `source_root` into site folders and listing failures
fn collect_site_roots<I>(source_root: &Path, entries: I) -> (Vec<SiteRoot>, Vec<WorkItem>)
where
    I: IntoIterator<Item = io::Result<PathBuf>>,
{
    let mut roots = Vec::new();
    let mut failures = Vec::new();

    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                failures.push(WorkItem::unreadable(
                    source_root.to_path_buf(),
                    String::new(),
                    e.to_string(),
                ));
                continue;
            }
        };

        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if let Some(site_id) = site_root_id(&name) {
            roots.push(SiteRoot { path, name, site_id });
        }
    }

    roots.sort_by(|a, b| a.name.cmp(&b.name));
    (roots, failures)
}

#[derive(Debug, Clone)]
struct WalkRoot {
    path: PathBuf,
    /// `None` when files are routed by their own name.
    site: Option<SiteRoot>,
}

/// Lazy depth-first sequence of [`WorkItem`], one site folder after another
pub struct Scan {
    exclusions: ExclusionSet,
    extensions: Vec<String>,
    /// Failures found before the walk proper, yielded first.
    pending: std::vec::IntoIter<WorkItem>,
    roots: std::vec::IntoIter<WalkRoot>,
    current: Option<(WalkRoot, walkdir::IntoIter)>,
    sites: Vec<String>,
    dirs: Vec<PathBuf>,
}

impl Scan {
    /// Drain the walk into everything a run dispatches
    pub fn into_plan(mut self) -> RunPlan {
        let items = self.by_ref().collect();
        RunPlan {
            items,
            sites: self.sites,
            dirs: self.dirs,
        }
    }

    fn next_root(&mut self) -> bool {
        match self.roots.next() {
            Some(root) => {
                if let Some(site) = &root.site {
                    self.sites.push(site.name.clone());
                    self.dirs.push(PathBuf::from(&site.name));
                }
                let walk = WalkDir::new(&root.path)
                    .min_depth(1)
                    .follow_links(false)
                    .sort_by_file_name()
                    .into_iter();
                self.current = Some((root, walk));
                true
            }
            None => false,
        }
    }

    fn classify(&self, root: &WalkRoot, path: PathBuf) -> WorkItem {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (site_id, site_dir) = root
            .site
            .as_ref()
            .map(|s| (s.site_id.clone(), s.name.clone()))
            .unwrap_or_default();

        if is_system_junk(&file_name) {
            return WorkItem::skip(path, site_id, site_dir, SkipReason::SystemJunk);
        }

        if !matches_extensions(&path, &self.extensions) {
            return WorkItem::skip(path, site_id, site_dir, SkipReason::InvalidExtension);
        }

        match &root.site {
            Some(_) => {
                let relative = path
                    .strip_prefix(&root.path)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| PathBuf::from(&file_name));
                WorkItem::copy(path, relative, site_id, site_dir)
            }
            None => match extract_site_id(&file_name) {
                Some(id) => {
                    let id = id.to_string();
                    WorkItem::copy(path, PathBuf::from(&file_name), id.clone(), id)
                }
                None => WorkItem::skip(path, String::new(), String::new(), SkipReason::NoIdentifier),
            },
        }
    }
}

impl Iterator for Scan {
    type Item = WorkItem;

    fn next(&mut self) -> Option<WorkItem> {
        if let Some(item) = self.pending.next() {
            return Some(item);
        }

        loop {
            if self.current.is_none() && !self.next_root() {
                return None;
            }

            let (root, walk) = self.current.as_mut()?;
            let entry = match walk.next() {
                Some(entry) => entry,
                None => {
                    self.current = None;
                    continue;
                }
            };

            match entry {
                Ok(entry) if entry.file_type().is_dir() => {
                    let relative = entry.path().strip_prefix(&root.path).unwrap_or(entry.path());
                    if self.exclusions.is_excluded_path(relative) {
                        debug!("Skipping excluded folder: {}", entry.path().display());
                        walk.skip_current_dir();
                    } else if let Some(site) = &root.site {
                        self.dirs.push(Path::new(&site.name).join(relative));
                    }
                }
                // Links to folders are listed but never descended into.
                Ok(entry) if entry.path_is_symlink() && entry.path().is_dir() => {
                    debug!("Not following folder link: {}", entry.path().display());
                }
                Ok(entry) => {
                    let root = root.clone();
                    return Some(self.classify(&root, entry.into_path()));
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root.path.clone());
                    warn!("Failed to read {}: {}", path.display(), e);
                    let site_dir = root.site.as_ref().map(|s| s.name.clone()).unwrap_or_default();
                    return Some(WorkItem::unreadable(path, site_dir, e.to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, relative.as_bytes()).unwrap();
    }

    fn names(items: &[WorkItem]) -> Vec<String> {
        let mut names: Vec<String> = items.iter().map(|i| i.file_name()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_site_roots_match_pattern_only() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "T1_00001/a.jpg");
        touch(tmp.path(), "t2_00002 Sur/b.jpg");
        touch(tmp.path(), "misc/c.jpg");
        touch(tmp.path(), "T3_00003.jpg");

        let walker = TreeWalker::new(tmp.path(), Mode::Backup, None);
        let roots = walker.site_roots().unwrap();
        let ids: Vec<&str> = roots.iter().map(|r| r.site_id.as_str()).collect();
        assert_eq!(ids, vec!["T1_00001", "T2_00002"]);
        assert_eq!(roots[1].name, "t2_00002 Sur");
    }

    #[test]
    fn test_backup_prunes_excluded_subtree() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "T1_00001/PROYECTO AGISOFT/x.jpg");
        touch(tmp.path(), "T1_00001/PROYECTO AGISOFT/deep/y.jpg");
        touch(tmp.path(), "T1_00001/photos/a.jpg");

        let items: Vec<WorkItem> = TreeWalker::new(tmp.path(), Mode::Backup, None)
            .scan()
            .unwrap()
            .collect();
        assert_eq!(names(&items), vec!["a.jpg"]);
        assert_eq!(items[0].relative_path, PathBuf::from("photos/a.jpg"));
        assert_eq!(items[0].site_id, "T1_00001");
        assert_eq!(items[0].site_dir, "T1_00001");
    }

    #[test]
    fn test_exclusion_is_case_insensitive_and_per_mode() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "T1_00001/Productos Generados/p.tif");
        touch(tmp.path(), "T1_00001/Fotos de Registro/r.jpg");

        let backup: Vec<WorkItem> = TreeWalker::new(tmp.path(), Mode::Backup, None)
            .scan()
            .unwrap()
            .collect();
        assert_eq!(names(&backup), vec!["p.tif"]);

        let report: Vec<WorkItem> = TreeWalker::new(tmp.path(), Mode::ReportStructure, None)
            .scan()
            .unwrap()
            .collect();
        assert_eq!(names(&report), vec!["r.jpg"]);
    }

    #[test]
    fn test_site_root_name_itself_is_not_checked() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "T1_00001/a.jpg");
        let walker =
            TreeWalker::new(tmp.path(), Mode::Backup, None).with_extra_exclusions(["T1_00001"]);
        assert_eq!(walker.count().unwrap(), 1);
    }

    #[test]
    fn test_junk_and_extension_filter_emit_skips() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "T1_00001/._a.jpg");
        touch(tmp.path(), "T1_00001/a.jpg");
        touch(tmp.path(), "T1_00001/notes.txt");

        let items: Vec<WorkItem> =
            TreeWalker::new(tmp.path(), Mode::Backup, Some(vec!["jpg".to_string()]))
                .scan()
                .unwrap()
                .collect();
        assert_eq!(items.len(), 3);
        let kind_of = |name: &str| {
            items
                .iter()
                .find(|i| i.file_name() == name)
                .map(|i| i.kind.clone())
                .unwrap()
        };
        assert_eq!(kind_of("._a.jpg"), WorkKind::Skip(SkipReason::SystemJunk));
        assert_eq!(kind_of("a.jpg"), WorkKind::Copy);
        assert_eq!(kind_of("notes.txt"), WorkKind::Skip(SkipReason::InvalidExtension));
    }

    #[test]
    fn test_images_mode_routes_by_file_name() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "campaign/day1/T2_00042_001_0000007.jpg");
        touch(tmp.path(), "campaign/IMG_0001.JPG");
        touch(tmp.path(), "campaign/T2_00042_notes.docx");
        touch(tmp.path(), "PROYECTO AGISOFT/T5_00005.png");

        let items: Vec<WorkItem> = TreeWalker::new(tmp.path(), Mode::Images, None)
            .scan()
            .unwrap()
            .collect();
        assert_eq!(items.len(), 4);

        let routed = items
            .iter()
            .find(|i| i.file_name() == "T2_00042_001_0000007.jpg")
            .unwrap();
        assert_eq!(routed.kind, WorkKind::Copy);
        assert_eq!(routed.site_dir, "T2_00042");
        assert_eq!(routed.relative_path, PathBuf::from("T2_00042_001_0000007.jpg"));

        let unrouted = items.iter().find(|i| i.file_name() == "IMG_0001.JPG").unwrap();
        assert_eq!(unrouted.kind, WorkKind::Skip(SkipReason::NoIdentifier));

        let docx = items
            .iter()
            .find(|i| i.file_name() == "T2_00042_notes.docx")
            .unwrap();
        assert_eq!(docx.kind, WorkKind::Skip(SkipReason::InvalidExtension));

        // images mode has no exclusion set
        let agisoft = items.iter().find(|i| i.file_name() == "T5_00005.png").unwrap();
        assert_eq!(agisoft.kind, WorkKind::Copy);
    }

    #[test]
    fn test_scan_is_restartable_and_deterministic() {
        let tmp = TempDir::new().unwrap();
        for rel in ["T1_00001/b.jpg", "T1_00001/a.jpg", "T1_00001/sub/c.jpg", "T2_00002/d.jpg"] {
            touch(tmp.path(), rel);
        }
        let walker = TreeWalker::new(tmp.path(), Mode::Backup, None);
        let first: Vec<PathBuf> = walker.scan().unwrap().map(|i| i.source_path).collect();
        let second: Vec<PathBuf> = walker.scan().unwrap().map(|i| i.source_path).collect();
        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
        assert_eq!(walker.count().unwrap(), 4);
    }

    #[test]
    fn test_missing_source_root_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let walker = TreeWalker::new(tmp.path().join("missing"), Mode::Backup, None);
        assert!(matches!(
            walker.scan(),
            Err(ConfigError::SourceUnreadable { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_yields_one_error_item() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "T1_00001/ok.jpg");
        touch(tmp.path(), "T1_00001/locked/hidden.jpg");
        let locked = tmp.path().join("T1_00001/locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can list anything; nothing to observe then.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let items: Vec<WorkItem> = TreeWalker::new(tmp.path(), Mode::Backup, None)
            .scan()
            .unwrap()
            .collect();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(items.len(), 2);
        let unreadable: Vec<&WorkItem> = items
            .iter()
            .filter(|i| matches!(i.kind, WorkKind::Unreadable(_)))
            .collect();
        assert_eq!(unreadable.len(), 1);
        assert_eq!(unreadable[0].source_path, locked);
    }

    #[test]
    fn test_listing_failures_become_unreadable_items() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "T1_00001/a.jpg");
        touch(tmp.path(), "notes.txt");

        let entries = vec![
            Ok(tmp.path().join("T1_00001")),
            Err(io::Error::new(io::ErrorKind::Other, "entry vanished")),
            Ok(tmp.path().join("notes.txt")),
        ];
        let (roots, failures) = collect_site_roots(tmp.path(), entries);

        assert_eq!(roots.len(), 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source_path, tmp.path());
        assert_eq!(failures[0].kind, WorkKind::Unreadable("entry vanished".to_string()));
    }

    #[test]
    fn test_plan_records_sites_and_walked_folders() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "T1_00001/FOTOS/a.jpg");
        fs::create_dir_all(tmp.path().join("T1_00001/FOTOS/vacia")).unwrap();
        fs::create_dir_all(tmp.path().join("T1_00001/PUNTOS DE CONTROL/gps")).unwrap();
        fs::create_dir_all(tmp.path().join("T2_00002")).unwrap();

        let plan = TreeWalker::new(tmp.path(), Mode::Backup, None)
            .scan()
            .unwrap()
            .into_plan();

        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.sites, vec!["T1_00001", "T2_00002"]);
        assert_eq!(
            plan.dirs,
            vec![
                PathBuf::from("T1_00001"),
                PathBuf::from("T1_00001/FOTOS"),
                PathBuf::from("T1_00001/FOTOS/vacia"),
                PathBuf::from("T2_00002"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_folder_link_is_not_an_item() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "elsewhere/z.jpg");
        touch(tmp.path(), "T1_00001/a.jpg");
        std::os::unix::fs::symlink(tmp.path().join("elsewhere"), tmp.path().join("T1_00001/link"))
            .unwrap();
        std::os::unix::fs::symlink(tmp.path().join("elsewhere/z.jpg"), tmp.path().join("T1_00001/z.jpg"))
            .unwrap();

        let items: Vec<WorkItem> = TreeWalker::new(tmp.path(), Mode::Backup, None)
            .scan()
            .unwrap()
            .collect();
        assert_eq!(names(&items), vec!["a.jpg", "z.jpg"]);
        assert!(items.iter().all(|i| i.kind == WorkKind::Copy));
    }
}
