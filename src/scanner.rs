//! Concurrent discovery of the files to sort.
//!
//! The walker fans out over the source tree on the rayon pool: every
//! subdirectory becomes its own task inside a [`rayon::scope`], so a call
//! for a directory only returns once everything beneath it has been visited.
//! Results land in a [`DiscoverySet`] owned by the caller.

use crate::config::CompiledFilters;
use crate::file_category::{Category, ClassificationRegistry, Lookup};
use crate::normalize::normalize;
use dashmap::{DashMap, DashSet};
use std::fs::{self, DirEntry, FileType, ReadDir};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Directory names the walkers never descend into, so output left behind by
/// an earlier run is not sorted again.
pub const RESERVED_DIR_NAMES: [&str; 6] =
    ["archives", "video", "audio", "documents", "images", "MY_OTHER"];

/// Returns true for a directory name that belongs to the output tree.
pub fn is_reserved_dir_name(name: &str) -> bool {
    RESERVED_DIR_NAMES.contains(&name)
}

/// A file found during the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Uppercased extension without the dot; empty when there is none.
    pub extension: String,
    pub parent: PathBuf,
}

impl FileEntry {
    pub fn new(path: PathBuf, extension: String) -> Self {
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            path,
            extension,
            parent,
        }
    }

    /// Raw file stem, e.g. `report.tar` for `report.tar.gz`.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Normalized stem with the original extension reattached.
    ///
    /// # Examples
    ///
    /// ```
    /// use dirsort::scanner::FileEntry;
    /// use std::path::PathBuf;
    ///
    /// let entry = FileEntry::new(PathBuf::from("/in/Мій звіт.Pdf"), "PDF".to_string());
    /// assert_eq!(entry.target_file_name(), "Mjej_zvjet.Pdf");
    /// ```
    pub fn target_file_name(&self) -> String {
        let stem = normalize(&self.stem());
        match self.path.extension().map(|ext| ext.to_string_lossy()) {
            Some(ext) if !ext.is_empty() => format!("{}.{}", stem, ext),
            _ => stem,
        }
    }
}

/// Everything one walk discovered.
///
/// Many walker tasks append concurrently; the set is only read once the walk
/// has joined.
#[derive(Debug, Default)]
pub struct DiscoverySet {
    files: DashMap<Category, Vec<FileEntry>>,
    extensions: DashSet<String>,
    unknown_extensions: DashSet<String>,
    directories: Mutex<Vec<PathBuf>>,
    failures: Mutex<Vec<(PathBuf, String)>>,
}

impl DiscoverySet {
    /// Files a category bucket holds, in no particular order.
    pub fn files(&self, category: Category) -> Vec<FileEntry> {
        self.files
            .get(&category)
            .map(|bucket| bucket.value().clone())
            .unwrap_or_default()
    }

    /// Drains every bucket, sorted by category.
    pub fn into_buckets(self) -> Vec<(Category, Vec<FileEntry>)> {
        let mut buckets: Vec<_> = self.files.into_iter().collect();
        buckets.sort_by_key(|(category, _)| *category);
        buckets
    }

    pub fn file_count(&self) -> usize {
        self.files.iter().map(|bucket| bucket.len()).sum()
    }

    /// Per-category counts, sorted by category.
    pub fn counts(&self) -> Vec<(Category, usize)> {
        let mut counts: Vec<_> = self
            .files
            .iter()
            .map(|bucket| (*bucket.key(), bucket.len()))
            .collect();
        counts.sort_by_key(|(category, _)| *category);
        counts
    }

    /// Every non-empty extension looked up, sorted.
    pub fn extensions(&self) -> Vec<String> {
        sorted(&self.extensions)
    }

    /// Extensions that missed the registry, sorted.
    pub fn unknown_extensions(&self) -> Vec<String> {
        sorted(&self.unknown_extensions)
    }

    /// Directories in the order they were discovered; a directory always
    /// precedes its own subdirectories.
    pub fn directories(&self) -> Vec<PathBuf> {
        self.directories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Directories that could not be listed.
    pub fn failures(&self) -> Vec<(PathBuf, String)> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Files a classified entry into its bucket and records its extension.
    pub fn record(&self, path: PathBuf, lookup: &Lookup) {
        match lookup {
            Lookup::NoExtension => {}
            Lookup::Known { extension, .. } => {
                self.extensions.insert(extension.clone());
            }
            Lookup::Unknown { extension } => {
                self.extensions.insert(extension.clone());
                self.unknown_extensions.insert(extension.clone());
            }
        }
        let entry = FileEntry::new(path, lookup.extension().to_string());
        self.files.entry(lookup.category()).or_default().push(entry);
    }

    fn push_directory(&self, dir: PathBuf) {
        self.directories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(dir);
    }

    fn push_failure(&self, path: PathBuf, reason: String) {
        warn!(path = %path.display(), %reason, "cannot read entry");
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((path, reason));
    }
}

fn sorted(set: &DashSet<String>) -> Vec<String> {
    let mut values: Vec<String> = set.iter().map(|ext| ext.key().clone()).collect();
    values.sort();
    values
}

/// Recursive, concurrent directory walker.
pub struct TreeWalker<'a> {
    registry: &'a ClassificationRegistry,
    filters: &'a CompiledFilters,
    skip: Option<&'a Path>,
}

impl<'a> TreeWalker<'a> {
    pub fn new(registry: &'a ClassificationRegistry, filters: &'a CompiledFilters) -> Self {
        Self {
            registry,
            filters,
            skip: None,
        }
    }

    /// Never descend into `dir`, typically an output root nested inside the
    /// source tree.
    pub fn skipping(mut self, dir: Option<&'a Path>) -> Self {
        self.skip = dir;
        self
    }

    /// Walks `root`, blocking until every nested task has finished.
    ///
    /// Run it inside [`rayon::ThreadPool::install`] to bound the fan-out to
    /// a specific pool.
    ///
    /// # Errors
    ///
    /// Only a failure to list `root` itself is an error. Unreadable
    /// subdirectories are recorded in [`DiscoverySet::failures`].
    pub fn walk(&self, root: &Path) -> io::Result<DiscoverySet> {
        let set = DiscoverySet::default();
        let entries = fs::read_dir(root)?;
        self.walk_entries(root, entries, &set);
        Ok(set)
    }

    fn walk_dir(&self, dir: &Path, set: &DiscoverySet) {
        match fs::read_dir(dir) {
            Ok(entries) => self.walk_entries(dir, entries, set),
            Err(e) => set.push_failure(dir.to_path_buf(), e.to_string()),
        }
    }

    fn walk_entries(&self, dir: &Path, entries: ReadDir, set: &DiscoverySet) {
        rayon::scope(|s| {
            for entry in entries {
                let (entry, file_type) = match resolve_entry(dir, entry) {
                    Ok(resolved) => resolved,
                    Err((path, reason)) => {
                        set.push_failure(path, reason);
                        continue;
                    }
                };
                let path = entry.path();

                if file_type.is_dir() {
                    if should_descend(&path, self.skip) {
                        set.push_directory(path.clone());
                        s.spawn(move |_| self.walk_dir(&path, set));
                    }
                } else if file_type.is_file() && self.filters.should_include(&path) {
                    let file_name = entry.file_name();
                    let lookup = self.registry.classify(&file_name.to_string_lossy());
                    debug!(file = %path.display(), category = %lookup.category(), "discovered");
                    set.record(path, &lookup);
                }
            }
        });
    }
}

/// Resolves one `read_dir` item. On failure, returns the path that could
/// not be read (the listed directory when the entry itself is unreadable).
pub(crate) fn resolve_entry(
    dir: &Path,
    entry: io::Result<DirEntry>,
) -> Result<(DirEntry, FileType), (PathBuf, String)> {
    let entry = entry.map_err(|e| (dir.to_path_buf(), e.to_string()))?;
    match entry.file_type() {
        Ok(file_type) => Ok((entry, file_type)),
        Err(e) => Err((entry.path(), e.to_string())),
    }
}

/// Whether a walker should enter `dir`.
pub(crate) fn should_descend(dir: &Path, skip: Option<&Path>) -> bool {
    if skip.is_some_and(|skip| skip == dir) {
        return false;
    }
    dir.file_name()
        .is_none_or(|name| !is_reserved_dir_name(&name.to_string_lossy()))
}
