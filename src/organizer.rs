//! The sorting pipeline.
//!
//! A run moves through fixed phases, each one fully drained before the next
//! starts:
//!
//! ```text
//! Init -> MirrorCopying -> Scanning -> Routing -> CleaningUp -> Done
//! ```
//!
//! All concurrent work runs on one bounded rayon pool owned by the
//! [`Organizer`]. Failures of single files are collected in the
//! [`RunReport`]; only a bad source or output directory aborts a run.

use crate::cleaner::{self, CleanupReport};
use crate::config::{CompiledFilters, OrganizerSettings, SortConfig};
use crate::file_category::{CATEGORY_ROOT_DIRS, Category, ClassificationRegistry};
use crate::file_organizer::{
    CategoryRouter, OrganizeError, OrganizeResult, Outcome, TransferMode,
};
use crate::mirror::{Mirror, NO_EXTENSION_DIR};
use crate::scanner::{FileEntry, TreeWalker};
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Pipeline phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Init,
    MirrorCopying,
    Scanning,
    Routing,
    CleaningUp,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::MirrorCopying => "mirror-copying",
            Phase::Scanning => "scanning",
            Phase::Routing => "routing",
            Phase::CleaningUp => "cleaning-up",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// A file the run could not handle, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl FileFailure {
    fn new(path: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            path,
            reason: reason.into(),
        }
    }
}

/// Everything a finished run has to say.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// RFC 3339 timestamp of when the run started.
    pub started_at: String,
    pub source: PathBuf,
    pub output: PathBuf,
    pub mode: TransferMode,
    /// Files copied by the by-extension mirror.
    pub mirrored: usize,
    /// Discovered files per category label.
    pub categories: BTreeMap<String, usize>,
    pub extensions: Vec<String>,
    pub unknown_extensions: Vec<String>,
    pub placed: usize,
    pub extracted: usize,
    /// Files with an archive extension that turned out not to be archives.
    pub not_archives: Vec<FileFailure>,
    pub failures: Vec<FileFailure>,
    pub cleanup: CleanupReport,
}

impl RunReport {
    fn new(source: PathBuf, output: PathBuf, mode: TransferMode, started_at: String) -> Self {
        Self {
            started_at,
            source,
            output,
            mode,
            mirrored: 0,
            categories: BTreeMap::new(),
            extensions: Vec::new(),
            unknown_extensions: Vec::new(),
            placed: 0,
            extracted: 0,
            not_archives: Vec::new(),
            failures: Vec::new(),
            cleanup: CleanupReport::default(),
        }
    }

    /// Files discovered by the scan.
    pub fn total_files(&self) -> usize {
        self.categories.values().sum()
    }

    fn record(&mut self, entry: FileEntry, result: OrganizeResult<Outcome>) {
        match result {
            Ok(Outcome::Placed { .. }) => self.placed += 1,
            Ok(Outcome::Extracted { .. }) => self.extracted += 1,
            Ok(Outcome::NotAnArchive { reason }) => {
                self.not_archives.push(FileFailure::new(entry.path, reason));
            }
            Err(e) => {
                warn!(file = %entry.path.display(), error = %e, "file not sorted");
                self.failures.push(FileFailure::new(entry.path, e.to_string()));
            }
        }
    }
}

/// Drives one or more sorting runs on a shared worker pool.
pub struct Organizer {
    settings: OrganizerSettings,
    filters: CompiledFilters,
    registry: ClassificationRegistry,
    pool: rayon::ThreadPool,
}

impl Organizer {
    /// Builds an organizer from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Fails on invalid filter patterns or when the worker pool cannot be
    /// started.
    pub fn new(config: &SortConfig) -> OrganizeResult<Self> {
        let filters = CompiledFilters::new(&config.filters)?;
        Self::with_filters(config.organizer.clone(), filters)
    }

    pub fn with_filters(
        settings: OrganizerSettings,
        filters: CompiledFilters,
    ) -> OrganizeResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.threads)
            .thread_name(|i| format!("dirsort-{}", i))
            .build()
            .map_err(|e| OrganizeError::ThreadPool(e.to_string()))?;

        Ok(Self {
            settings,
            filters,
            registry: ClassificationRegistry::default(),
            pool,
        })
    }

    pub fn settings(&self) -> &OrganizerSettings {
        &self.settings
    }

    /// Sorts `source` into `output`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dirsort::config::SortConfig;
    /// use dirsort::organizer::Organizer;
    /// use std::path::Path;
    ///
    /// let organizer = Organizer::new(&SortConfig::default()).unwrap();
    /// let report = organizer.run(Path::new("Downloads"), Path::new("dist")).unwrap();
    /// println!("{} files, unknown: {:?}", report.total_files(), report.unknown_extensions);
    /// ```
    pub fn run(&self, source: &Path, output: &Path) -> OrganizeResult<RunReport> {
        self.run_with_progress(source, output, &ProgressBar::hidden())
    }

    /// Like [`Organizer::run`], ticking `progress` once per routed file.
    pub fn run_with_progress(
        &self,
        source: &Path,
        output: &Path,
        progress: &ProgressBar,
    ) -> OrganizeResult<RunReport> {
        let started_at = chrono::Utc::now().to_rfc3339();

        enter(Phase::Init);
        let (source, output) = prepare(source, output)?;
        let skip = Some(output.as_path());
        let mut report = RunReport::new(
            source.clone(),
            output.clone(),
            self.settings.mode,
            started_at,
        );

        if self.settings.mirror {
            enter(Phase::MirrorCopying);
            let mirror = Mirror::new(&output, &self.filters).skipping(skip);
            let mirrored = self
                .pool
                .install(|| mirror.run(&source))
                .map_err(|e| invalid_source(&source, e))?;
            report.mirrored = mirrored.copied;
            report.failures.extend(
                mirrored
                    .failures
                    .into_iter()
                    .map(|(path, reason)| FileFailure::new(path, reason)),
            );
        }

        enter(Phase::Scanning);
        let walker = TreeWalker::new(&self.registry, &self.filters).skipping(skip);
        let discovered = self
            .pool
            .install(|| walker.walk(&source))
            .map_err(|e| invalid_source(&source, e))?;
        report.extensions = discovered.extensions();
        report.unknown_extensions = discovered.unknown_extensions();
        report.failures.extend(
            discovered
                .failures()
                .into_iter()
                .map(|(path, reason)| FileFailure::new(path, reason)),
        );
        let directories = discovered.directories();
        let buckets = discovered.into_buckets();
        report.categories = buckets
            .iter()
            .map(|(category, files)| (category.label(), files.len()))
            .collect();

        enter(Phase::Routing);
        let work: Vec<(Category, FileEntry)> = buckets
            .into_iter()
            .flat_map(|(category, files)| files.into_iter().map(move |file| (category, file)))
            .collect();
        progress.set_length(work.len() as u64);
        let router = CategoryRouter::new(&output, self.settings.mode);
        let results: Vec<_> = self.pool.install(|| {
            work.into_par_iter()
                .map(|(category, entry)| {
                    let result = router.dispatch(category, &entry);
                    progress.inc(1);
                    (entry, result)
                })
                .collect()
        });
        for (entry, result) in results {
            report.record(entry, result);
        }

        if self.settings.cleanup {
            enter(Phase::CleaningUp);
            report.cleanup = cleaner::remove_empty_dirs(&directories, &source);
        }

        enter(Phase::Done);
        info!(
            files = report.total_files(),
            placed = report.placed,
            extracted = report.extracted,
            mirrored = report.mirrored,
            unknown = ?report.unknown_extensions,
            failures = report.failures.len(),
            "run finished"
        );
        Ok(report)
    }
}

fn enter(phase: Phase) {
    info!(%phase, "entering phase");
}

/// Validates the source, creates the output, and resolves both paths.
fn prepare(source: &Path, output: &Path) -> OrganizeResult<(PathBuf, PathBuf)> {
    let metadata = fs::metadata(source).map_err(|e| invalid_source(source, e))?;
    if !metadata.is_dir() {
        return Err(invalid_source(
            source,
            io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }
    let source = source
        .canonicalize()
        .map_err(|e| invalid_source(source, e))?;

    fs::create_dir_all(output).map_err(|e| OrganizeError::DirectoryCreationFailed {
        path: output.to_path_buf(),
        source: e,
    })?;
    let output = output
        .canonicalize()
        .map_err(|e| OrganizeError::DirectoryCreationFailed {
            path: output.to_path_buf(),
            source: e,
        })?;

    if overlaps(&source, &output) {
        return Err(OrganizeError::OverlappingPaths {
            source_dir: source,
            output,
        });
    }
    Ok((source, output))
}

/// True when sorting `source` into `output` would read back what the run
/// writes: the two are the same directory, or the source sits inside a
/// category folder or mirror bucket of the output.
fn overlaps(source: &Path, output: &Path) -> bool {
    let Ok(rest) = source.strip_prefix(output) else {
        return false;
    };
    match rest.components().next() {
        None => true,
        Some(first) => {
            let name = first.as_os_str().to_string_lossy();
            CATEGORY_ROOT_DIRS.contains(&name.as_ref())
                || name == NO_EXTENSION_DIR
                || name.starts_with('.')
        }
    }
}

fn invalid_source(path: &Path, e: io::Error) -> OrganizeError {
    OrganizeError::InvalidSource {
        path: path.to_path_buf(),
        source: e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn organizer(mirror: bool, mode: TransferMode) -> Organizer {
        let settings = OrganizerSettings {
            threads: 2,
            mirror,
            mode,
            cleanup: true,
        };
        Organizer::with_filters(settings, CompiledFilters::allow_all()).unwrap()
    }

    #[test]
    fn test_phases_are_ordered() {
        assert!(Phase::Init < Phase::MirrorCopying);
        assert!(Phase::MirrorCopying < Phase::Scanning);
        assert!(Phase::Scanning < Phase::Routing);
        assert!(Phase::Routing < Phase::CleaningUp);
        assert!(Phase::CleaningUp < Phase::Done);
        assert_eq!(Phase::CleaningUp.to_string(), "cleaning-up");
    }

    #[test]
    fn test_missing_source_is_rejected() {
        let temp = TempDir::new().unwrap();
        let result = organizer(true, TransferMode::Copy)
            .run(&temp.path().join("missing"), &temp.path().join("out"));
        assert!(matches!(result, Err(OrganizeError::InvalidSource { .. })));
    }

    #[test]
    fn test_file_as_source_is_rejected() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, b"x").unwrap();
        let result = organizer(true, TransferMode::Copy).run(&file, &temp.path().join("out"));
        assert!(matches!(result, Err(OrganizeError::InvalidSource { .. })));
    }

    #[test]
    fn test_output_equal_to_source_is_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), b"a").unwrap();

        let result = organizer(true, TransferMode::Copy).run(temp.path(), temp.path());

        assert!(matches!(result, Err(OrganizeError::OverlappingPaths { .. })));
        assert!(!temp.path().join(".txt").exists());
        assert!(!temp.path().join("documents").exists());
    }

    #[test]
    fn test_overlap_rules() {
        let out = Path::new("/data/sorted");
        assert!(overlaps(out, out));
        assert!(overlaps(&out.join("documents/inbox"), out));
        assert!(overlaps(&out.join(".txt"), out));
        assert!(overlaps(&out.join("_noext"), out));
        assert!(!overlaps(&out.join("inbox"), out));
        assert!(!overlaps(Path::new("/data/inbox"), out));
        assert!(!overlaps(Path::new("/data"), out));
    }

    #[test]
    fn test_invalid_filter_pattern_is_rejected() {
        let config = SortConfig::from_toml("[filters.exclude]\npatterns = [\"[oops\"]\n").unwrap();
        assert!(matches!(
            Organizer::new(&config),
            Err(OrganizeError::Config(_))
        ));
    }

    #[test]
    fn test_run_counts_and_places() {
        let source = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::write(source.path().join("a.png"), b"png").unwrap();
        fs::write(source.path().join("b.weird"), b"??").unwrap();

        let report = organizer(false, TransferMode::Copy)
            .run(source.path(), output.path())
            .unwrap();

        assert_eq!(report.total_files(), 2);
        assert_eq!(report.placed, 2);
        assert_eq!(report.mirrored, 0);
        assert_eq!(report.categories.get("images/PNG"), Some(&1));
        assert_eq!(report.categories.get("MY_OTHER"), Some(&1));
        assert_eq!(report.unknown_extensions, vec!["WEIRD"]);
        assert!(output.path().join("images/PNG/a.png").exists());
        assert!(output.path().join("MY_OTHER/b.weird").exists());
    }

    #[test]
    fn test_repeated_runs_do_not_leak_state() {
        let source = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::write(source.path().join("a.txt"), b"txt").unwrap();
        let organizer = organizer(false, TransferMode::Copy);

        let first = organizer.run(source.path(), output.path()).unwrap();
        let second = organizer.run(source.path(), output.path()).unwrap();

        assert_eq!(first.total_files(), 1);
        assert_eq!(second.total_files(), 1);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let source = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::write(source.path().join("a.txt"), b"txt").unwrap();

        let report = organizer(true, TransferMode::Copy)
            .run(source.path(), output.path())
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["mode"], "copy");
        assert_eq!(json["mirrored"], 1);
        assert_eq!(json["categories"]["documents"], 1);
    }
}
