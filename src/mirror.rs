//! Flat by-extension mirror of the source tree.
//!
//! Every file is copied to `<output>/<.ext>/<original name>`, keyed by its
//! literal extension (case preserved, dot included). Files without an
//! extension, dotfiles included, go to `<output>/_noext/`, so no mirror copy
//! ever takes a name the category tree needs. Names are not normalized and a
//! later copy of the same name overwrites an earlier one.

use crate::config::CompiledFilters;
use crate::scanner::{resolve_entry, should_descend};
use std::fs::{self, ReadDir};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Bucket for files that have no extension.
pub const NO_EXTENSION_DIR: &str = "_noext";

/// Totals for one mirror pass.
#[derive(Debug, Default)]
pub struct MirrorReport {
    pub copied: usize,
    pub failures: Vec<(PathBuf, String)>,
}

#[derive(Default)]
struct Tally {
    copied: AtomicUsize,
    failures: Mutex<Vec<(PathBuf, String)>>,
}

impl Tally {
    fn fail(&self, path: &Path, reason: String) {
        warn!(file = %path.display(), %reason, "mirror copy failed");
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((path.to_path_buf(), reason));
    }

    fn into_report(self) -> MirrorReport {
        MirrorReport {
            copied: self.copied.into_inner(),
            failures: self
                .failures
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// Mirrors `source` into `output`, fanning out on the current rayon pool.
pub struct Mirror<'a> {
    output: &'a Path,
    filters: &'a CompiledFilters,
    skip: Option<&'a Path>,
}

impl<'a> Mirror<'a> {
    pub fn new(output: &'a Path, filters: &'a CompiledFilters) -> Self {
        Self {
            output,
            filters,
            skip: None,
        }
    }

    pub fn skipping(mut self, dir: Option<&'a Path>) -> Self {
        self.skip = dir;
        self
    }

    /// Destination of one file's mirror copy.
    ///
    /// # Examples
    ///
    /// ```
    /// use dirsort::config::CompiledFilters;
    /// use dirsort::mirror::Mirror;
    /// use std::path::Path;
    ///
    /// let filters = CompiledFilters::allow_all();
    /// let mirror = Mirror::new(Path::new("/dist"), &filters);
    /// assert_eq!(mirror.destination(Path::new("/src/a/Notes.TXT")), Path::new("/dist/.TXT/Notes.TXT"));
    /// assert_eq!(mirror.destination(Path::new("/src/LICENSE")), Path::new("/dist/_noext/LICENSE"));
    /// assert_eq!(mirror.destination(Path::new("/src/.txt")), Path::new("/dist/_noext/.txt"));
    /// ```
    pub fn destination(&self, file: &Path) -> PathBuf {
        let folder = match file.extension().map(|ext| ext.to_string_lossy()) {
            Some(ext) if !ext.is_empty() => self.output.join(format!(".{}", ext)),
            _ => self.output.join(NO_EXTENSION_DIR),
        };
        match file.file_name() {
            Some(name) => folder.join(name),
            None => folder,
        }
    }

    /// Copies every file under `source`, blocking until all copies finish.
    ///
    /// # Errors
    ///
    /// Fails only when `source` itself cannot be listed; per-file failures
    /// are collected in the report.
    pub fn run(&self, source: &Path) -> io::Result<MirrorReport> {
        let tally = Tally::default();
        let entries = fs::read_dir(source)?;
        self.mirror_entries(source, entries, &tally);
        Ok(tally.into_report())
    }

    fn mirror_dir(&self, dir: &Path, tally: &Tally) {
        match fs::read_dir(dir) {
            Ok(entries) => self.mirror_entries(dir, entries, tally),
            Err(e) => tally.fail(dir, e.to_string()),
        }
    }

    fn mirror_entries(&self, dir: &Path, entries: ReadDir, tally: &Tally) {
        rayon::scope(|s| {
            for entry in entries {
                let (entry, file_type) = match resolve_entry(dir, entry) {
                    Ok(resolved) => resolved,
                    Err((path, reason)) => {
                        tally.fail(&path, reason);
                        continue;
                    }
                };
                let path = entry.path();

                if file_type.is_dir() {
                    if should_descend(&path, self.skip) {
                        s.spawn(move |_| self.mirror_dir(&path, tally));
                    }
                } else if file_type.is_file() && self.filters.should_include(&path) {
                    s.spawn(move |_| self.copy_one(&path, tally));
                }
            }
        });
    }

    fn copy_one(&self, file: &Path, tally: &Tally) {
        let destination = self.destination(file);
        if let Some(folder) = destination.parent()
            && let Err(e) = fs::create_dir_all(folder)
        {
            tally.fail(file, e.to_string());
            return;
        }
        match fs::copy(file, &destination) {
            Ok(_) => {
                debug!(file = %file.display(), to = %destination.display(), "mirrored");
                tally.copied.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => tally.fail(file, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, data: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    #[test]
    fn test_mirror_buckets_by_literal_extension() {
        let source = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        touch(source.path(), "a.txt", b"a");
        touch(source.path(), "deep/nested/b.TXT", b"b");
        touch(source.path(), "deep/c.png", b"c");
        touch(source.path(), "README", b"r");
        touch(source.path(), "deep/.txt", b"dot");

        let filters = CompiledFilters::allow_all();
        let report = Mirror::new(output.path(), &filters)
            .run(source.path())
            .unwrap();

        assert_eq!(report.copied, 5);
        assert!(report.failures.is_empty());
        assert_eq!(fs::read(output.path().join(".txt/a.txt")).unwrap(), b"a");
        assert_eq!(fs::read(output.path().join(".TXT/b.TXT")).unwrap(), b"b");
        assert!(output.path().join(".png/c.png").exists());
        assert!(output.path().join("_noext/README").exists());
        assert_eq!(fs::read(output.path().join("_noext/.txt")).unwrap(), b"dot");
        assert!(output.path().join(".txt").is_dir());
        assert!(source.path().join("deep/c.png").exists());
    }

    #[test]
    fn test_mirror_skips_reserved_and_output_dirs() {
        let source = TempDir::new().unwrap();
        touch(source.path(), "images/PNG/old.png", b"old");
        touch(source.path(), "dist/.txt/prev.txt", b"prev");
        touch(source.path(), "fresh.txt", b"fresh");
        let output = source.path().join("dist");

        let filters = CompiledFilters::allow_all();
        let report = Mirror::new(&output, &filters)
            .skipping(Some(&output))
            .run(source.path())
            .unwrap();

        assert_eq!(report.copied, 1);
        assert!(!output.join(".png").exists());
    }

    #[test]
    fn test_mirror_missing_source_is_an_error() {
        let temp = TempDir::new().unwrap();
        let filters = CompiledFilters::allow_all();
        let result = Mirror::new(temp.path(), &filters).run(&temp.path().join("missing"));
        assert!(result.is_err());
    }
}
