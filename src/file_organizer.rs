//! Placing discovered files into the category tree.
//!
//! [`CategoryRouter`] decides where a file goes and which handler takes it;
//! [`FileOrganizer`] does the actual copy (or move) under the normalized
//! name. Archives are handed to [`crate::archive`].

use crate::archive::{self, ArchiveError};
use crate::config::ConfigError;
use crate::file_category::Category;
use crate::scanner::FileEntry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How a file reaches its destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Leave the source file in place.
    #[default]
    Copy,
    /// Remove the source file once it has been placed.
    Move,
}

/// What a handler did with one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The file was written to `destination`.
    Placed { destination: PathBuf },
    /// The archive was unpacked into `folder`.
    Extracted { folder: PathBuf },
    /// The file claimed to be an archive but was not; nothing was written.
    NotAnArchive { reason: String },
}

/// Errors that can occur while organizing files.
#[derive(Debug)]
pub enum OrganizeError {
    /// The source directory is missing or not a directory.
    InvalidSource {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The output tree would be written into the tree being sorted.
    OverlappingPaths { source_dir: PathBuf, output: PathBuf },
    /// Failed to create a destination directory.
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to copy or move a file to its destination.
    FileTransferFailed {
        source: PathBuf,
        destination: PathBuf,
        source_error: std::io::Error,
    },
    /// An archive could not be read or unpacked for reasons other than its
    /// format.
    Archive(ArchiveError),
    /// The worker pool could not be started.
    ThreadPool(String),
    /// The configuration could not be applied.
    Config(ConfigError),
}

impl std::fmt::Display for OrganizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSource { path, source } => {
                write!(f, "Invalid source directory {}: {}", path.display(), source)
            }
            Self::OverlappingPaths { source_dir, output } => {
                write!(
                    f,
                    "Output directory {} overlaps the source directory {}",
                    output.display(),
                    source_dir.display()
                )
            }
            Self::DirectoryCreationFailed { path, source } => {
                write!(
                    f,
                    "Failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::FileTransferFailed {
                source,
                destination,
                source_error,
            } => {
                write!(
                    f,
                    "Failed to transfer {} to {}: {}",
                    source.display(),
                    destination.display(),
                    source_error
                )
            }
            Self::Archive(e) => write!(f, "{}", e),
            Self::ThreadPool(reason) => write!(f, "Failed to start worker pool: {}", reason),
            Self::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for OrganizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidSource { source, .. } | Self::DirectoryCreationFailed { source, .. } => {
                Some(source)
            }
            Self::FileTransferFailed { source_error, .. } => Some(source_error),
            Self::Archive(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::ThreadPool(_) | Self::OverlappingPaths { .. } => None,
        }
    }
}

impl From<ArchiveError> for OrganizeError {
    fn from(e: ArchiveError) -> Self {
        Self::Archive(e)
    }
}

impl From<ConfigError> for OrganizeError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Signature shared by every category handler.
pub type Handler = fn(&FileEntry, &Path, TransferMode) -> OrganizeResult<Outcome>;

/// Picks the handler for a category.
pub fn handler_for(category: Category) -> Handler {
    match category {
        Category::Image(_) | Category::Audio(_) => FileOrganizer::handle_media,
        Category::Document | Category::Other => FileOrganizer::handle_other,
        Category::Archive => archive::handle_archive,
    }
}

/// Sends files to their category folder under one output root.
#[derive(Debug, Clone, Copy)]
pub struct CategoryRouter<'a> {
    output_root: &'a Path,
    mode: TransferMode,
}

impl<'a> CategoryRouter<'a> {
    pub fn new(output_root: &'a Path, mode: TransferMode) -> Self {
        Self { output_root, mode }
    }

    /// Folder a category's files end up in.
    pub fn destination(&self, category: Category) -> PathBuf {
        self.output_root.join(category.dir_path())
    }

    /// Hands `entry` to its category's handler.
    pub fn dispatch(&self, category: Category, entry: &FileEntry) -> OrganizeResult<Outcome> {
        let handler = handler_for(category);
        handler(entry, &self.destination(category), self.mode)
    }
}

/// Writes files into category folders.
pub struct FileOrganizer;

impl FileOrganizer {
    pub fn handle_media(
        entry: &FileEntry,
        target_folder: &Path,
        mode: TransferMode,
    ) -> OrganizeResult<Outcome> {
        Self::place_file(entry, target_folder, mode)
    }

    pub fn handle_other(
        entry: &FileEntry,
        target_folder: &Path,
        mode: TransferMode,
    ) -> OrganizeResult<Outcome> {
        Self::place_file(entry, target_folder, mode)
    }

    /// Copies (or moves) a file into `target_folder` under its normalized
    /// name, creating the folder if needed and overwriting any file of the
    /// same name.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dirsort::file_organizer::{FileOrganizer, TransferMode};
    /// use dirsort::scanner::FileEntry;
    /// use std::path::{Path, PathBuf};
    ///
    /// let entry = FileEntry::new(PathBuf::from("/in/Фото 1.png"), "PNG".to_string());
    /// let outcome = FileOrganizer::place_file(&entry, Path::new("/out/images/PNG"), TransferMode::Copy);
    /// // writes /out/images/PNG/Foto_1.png
    /// ```
    pub fn place_file(
        entry: &FileEntry,
        target_folder: &Path,
        mode: TransferMode,
    ) -> OrganizeResult<Outcome> {
        ensure_dir(target_folder)?;

        let destination = target_folder.join(entry.target_file_name());
        match mode {
            TransferMode::Copy => {
                fs::copy(&entry.path, &destination).map_err(|e| {
                    OrganizeError::FileTransferFailed {
                        source: entry.path.clone(),
                        destination: destination.clone(),
                        source_error: e,
                    }
                })?;
            }
            TransferMode::Move => move_file(&entry.path, &destination)?,
        }

        Ok(Outcome::Placed { destination })
    }
}

/// Creates `dir` and its parents; an existing directory is fine.
pub(crate) fn ensure_dir(dir: &Path) -> OrganizeResult<()> {
    fs::create_dir_all(dir).map_err(|e| OrganizeError::DirectoryCreationFailed {
        path: dir.to_path_buf(),
        source: e,
    })
}

/// Renames `from` to `to`, falling back to copy and delete when a rename is
/// not possible (e.g. across filesystems).
fn move_file(from: &Path, to: &Path) -> OrganizeResult<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    let transfer_error = |e| OrganizeError::FileTransferFailed {
        source: from.to_path_buf(),
        destination: to.to_path_buf(),
        source_error: e,
    };
    fs::copy(from, to).map_err(transfer_error)?;
    fs::remove_file(from).map_err(transfer_error)
}
