//! Archive expansion.
//!
//! Archives are unpacked into a folder named after their normalized stem
//! under the archives destination. The format is picked from the file name
//! and confirmed by sniffing magic bytes with `infer`, so a file that only
//! pretends to be an archive is reported as [`ArchiveError::NotAnArchive`]
//! instead of failing the run. Extraction happens in a staging directory, so
//! a rejected archive leaves nothing under the destination.

use crate::file_organizer::{OrganizeError, OrganizeResult, Outcome, TransferMode, ensure_dir};
use crate::normalize::normalize;
use crate::scanner::FileEntry;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Bytes read for format detection; covers the tar header magic at 257.
const SNIFF_LEN: u64 = 512;

/// Formats the dispatcher knows how to expand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    /// A lone gzip stream holding a single file.
    Gzip,
}

impl ArchiveFormat {
    /// Picks a format from the file name, case-insensitively.
    ///
    /// # Examples
    ///
    /// ```
    /// use dirsort::archive::ArchiveFormat;
    /// use std::path::Path;
    ///
    /// assert_eq!(ArchiveFormat::from_path(Path::new("a.tar.gz")), Some(ArchiveFormat::TarGz));
    /// assert_eq!(ArchiveFormat::from_path(Path::new("a.GZ")), Some(ArchiveFormat::Gzip));
    /// assert_eq!(ArchiveFormat::from_path(Path::new("a.rar")), None);
    /// ```
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".gz") {
            Some(Self::Gzip)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Why an archive could not be expanded.
#[derive(Debug)]
pub enum ArchiveError {
    /// The file is not a valid archive of its claimed format.
    NotAnArchive { path: PathBuf, reason: String },
    /// Reading the archive or writing its contents failed.
    Io { path: PathBuf, source: io::Error },
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnArchive { path, reason } => {
                write!(f, "{} is not an archive: {}", path.display(), reason)
            }
            Self::Io { path, source } => {
                write!(f, "Failed to unpack {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotAnArchive { .. } => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Unpacks `archive` into the existing directory `dest`.
///
/// # Errors
///
/// [`ArchiveError::NotAnArchive`] when the name matches no supported format,
/// the magic bytes disagree with it, or the contents are corrupt or cut
/// short; [`ArchiveError::Io`] for everything else. On error `dest` may hold
/// partial output.
pub fn extract(archive: &Path, dest: &Path) -> ArchiveResult<()> {
    let not_an_archive = |reason: &str| ArchiveError::NotAnArchive {
        path: archive.to_path_buf(),
        reason: reason.to_string(),
    };
    let io_error = |source: io::Error| ArchiveError::Io {
        path: archive.to_path_buf(),
        source,
    };

    let format =
        ArchiveFormat::from_path(archive).ok_or_else(|| not_an_archive("unsupported format"))?;
    let head = sniff(archive).map_err(io_error)?;

    match format {
        ArchiveFormat::Zip => {
            if !infer::archive::is_zip(&head) {
                return Err(not_an_archive("missing zip signature"));
            }
            let file = File::open(archive).map_err(io_error)?;
            let mut zip = zip::ZipArchive::new(BufReader::new(file))
                .map_err(|e| zip_error(archive, e))?;
            zip.extract(dest).map_err(|e| zip_error(archive, e))
        }
        ArchiveFormat::Tar => {
            if !infer::archive::is_tar(&head) {
                return Err(not_an_archive("missing tar header"));
            }
            let file = File::open(archive).map_err(io_error)?;
            tar::Archive::new(BufReader::new(file))
                .unpack(dest)
                .map_err(|e| stream_error(archive, e))
        }
        ArchiveFormat::TarGz => {
            if !infer::archive::is_gz(&head) {
                return Err(not_an_archive("missing gzip signature"));
            }
            let inner = sniff_gzip(archive).map_err(|e| stream_error(archive, e))?;
            if !infer::archive::is_tar(&inner) {
                return Err(not_an_archive("gzip stream does not hold a tar archive"));
            }
            let file = File::open(archive).map_err(io_error)?;
            tar::Archive::new(GzDecoder::new(BufReader::new(file)))
                .unpack(dest)
                .map_err(|e| stream_error(archive, e))
        }
        ArchiveFormat::Gzip => {
            if !infer::archive::is_gz(&head) {
                return Err(not_an_archive("missing gzip signature"));
            }
            let inner_name = archive
                .file_stem()
                .map(|stem| stem.to_os_string())
                .ok_or_else(|| not_an_archive("archive has no name"))?;
            let file = File::open(archive).map_err(io_error)?;
            let mut decoder = GzDecoder::new(BufReader::new(file));
            let mut out = File::create(dest.join(inner_name)).map_err(io_error)?;
            io::copy(&mut decoder, &mut out)
                .map(|_| ())
                .map_err(|e| stream_error(archive, e))
        }
    }
}

/// Handler for [`crate::file_category::Category::Archive`].
///
/// Unpacks into a staging directory beside `<target_folder>/<normalized
/// stem>` and only moves the result into place once extraction succeeded.
/// A file that turns out not to be an archive, or breaks off halfway, is
/// reported and leaves nothing behind; in move mode the source is only
/// removed after a successful extraction.
pub fn handle_archive(
    entry: &FileEntry,
    target_folder: &Path,
    mode: TransferMode,
) -> OrganizeResult<Outcome> {
    ensure_dir(target_folder)?;
    let folder = target_folder.join(folder_name(entry));
    // Removed on drop, together with whatever a failed extraction wrote.
    let staging = tempfile::Builder::new()
        .prefix(".unpacking-")
        .tempdir_in(target_folder)
        .map_err(|e| OrganizeError::DirectoryCreationFailed {
            path: target_folder.to_path_buf(),
            source: e,
        })?;

    match extract(&entry.path, staging.path()) {
        Ok(()) => {
            publish(staging.path(), &folder).map_err(|e| ArchiveError::Io {
                path: entry.path.clone(),
                source: e,
            })?;
            debug!(archive = %entry.path.display(), folder = %folder.display(), "unpacked");
            if mode == TransferMode::Move {
                fs::remove_file(&entry.path).map_err(|e| ArchiveError::Io {
                    path: entry.path.clone(),
                    source: e,
                })?;
            }
            Ok(Outcome::Extracted { folder })
        }
        Err(ArchiveError::NotAnArchive { path, reason }) => {
            warn!(file = %path.display(), %reason, "not an archive");
            Ok(Outcome::NotAnArchive { reason })
        }
        Err(e) => Err(e.into()),
    }
}

/// Moves an unpacked tree into `folder`. Two archives whose stems normalize
/// alike share a folder, so an existing one is merged into, file by file.
fn publish(staging: &Path, folder: &Path) -> io::Result<()> {
    if fs::rename(staging, folder).is_ok() {
        return Ok(());
    }
    merge_into(staging, folder)
}

fn merge_into(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        let existing = fs::symlink_metadata(&target).ok();

        if entry.file_type()?.is_dir() && existing.as_ref().is_some_and(|m| m.is_dir()) {
            merge_into(&entry.path(), &target)?;
            continue;
        }
        match existing {
            Some(meta) if meta.is_dir() => fs::remove_dir_all(&target)?,
            Some(_) => fs::remove_file(&target)?,
            None => {}
        }
        fs::rename(entry.path(), &target)?;
    }
    Ok(())
}

fn folder_name(entry: &FileEntry) -> String {
    let name = normalize(&entry.stem());
    if name.is_empty() {
        "_".to_string()
    } else {
        name
    }
}

fn sniff(path: &Path) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    File::open(path)?.take(SNIFF_LEN).read_to_end(&mut head)?;
    Ok(head)
}

fn sniff_gzip(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    GzDecoder::new(BufReader::new(file))
        .take(SNIFF_LEN)
        .read_to_end(&mut head)?;
    Ok(head)
}

fn zip_error(path: &Path, e: zip::result::ZipError) -> ArchiveError {
    match e {
        zip::result::ZipError::Io(source) => stream_error(path, source),
        other => ArchiveError::NotAnArchive {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

/// Sorts an error raised while decoding an archive. A broken deflate stream,
/// a failed checksum, or a tar entry cut short surfaces as one of these
/// kinds; anything else is a genuine I/O failure.
fn stream_error(path: &Path, e: io::Error) -> ArchiveError {
    match e.kind() {
        io::ErrorKind::InvalidInput
        | io::ErrorKind::InvalidData
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::Other => ArchiveError::NotAnArchive {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
        _ => ArchiveError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip_bytes(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn entry_for(path: &Path) -> FileEntry {
        FileEntry::new(
            path.to_path_buf(),
            crate::file_category::extension_of(&path.to_string_lossy()),
        )
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ArchiveFormat::from_path(Path::new("x.ZIP")),
            Some(ArchiveFormat::Zip)
        );
        assert_eq!(
            ArchiveFormat::from_path(Path::new("x.tar")),
            Some(ArchiveFormat::Tar)
        );
        assert_eq!(
            ArchiveFormat::from_path(Path::new("x.tgz")),
            Some(ArchiveFormat::TarGz)
        );
        assert_eq!(ArchiveFormat::from_path(Path::new("x.txt")), None);
    }

    #[test]
    fn test_extract_zip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("bundle.zip");
        write_zip(&archive, &[("a.txt", b"alpha"), ("nested/b.txt", b"beta")]);
        let dest = temp.path().join("out");
        fs::create_dir(&dest).unwrap();

        extract(&archive, &dest).unwrap();

        assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(dest.join("nested").join("b.txt")).unwrap(), b"beta");
    }

    #[test]
    fn test_extract_tar_and_tar_gz() {
        let temp = TempDir::new().unwrap();
        let tar_data = tar_bytes(&[("inside.txt", b"tarred")]);
        let plain = temp.path().join("plain.tar");
        fs::write(&plain, &tar_data).unwrap();
        let packed = temp.path().join("packed.tar.gz");
        fs::write(&packed, gzip_bytes(&tar_data)).unwrap();

        for archive in [&plain, &packed] {
            let dest = temp.path().join(format!(
                "{}_out",
                archive.file_name().unwrap().to_string_lossy()
            ));
            fs::create_dir(&dest).unwrap();
            extract(archive, &dest).unwrap();
            assert_eq!(fs::read(dest.join("inside.txt")).unwrap(), b"tarred");
        }
    }

    #[test]
    fn test_extract_single_gzip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("notes.txt.gz");
        fs::write(&archive, gzip_bytes(b"gzipped")).unwrap();
        let dest = temp.path().join("out");
        fs::create_dir(&dest).unwrap();

        extract(&archive, &dest).unwrap();

        assert_eq!(fs::read(dest.join("notes.txt")).unwrap(), b"gzipped");
    }

    #[test]
    fn test_fake_archives_are_rejected() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("out");
        fs::create_dir(&dest).unwrap();

        for name in ["fake.zip", "fake.tar", "fake.gz", "fake.tar.gz"] {
            let archive = temp.path().join(name);
            fs::write(&archive, b"this is plain text, not an archive").unwrap();
            let result = extract(&archive, &dest);
            assert!(
                matches!(result, Err(ArchiveError::NotAnArchive { .. })),
                "{} should be rejected, got {:?}",
                name,
                result
            );
        }
    }

    #[test]
    fn test_gzip_without_tar_inside_is_rejected_as_tar_gz() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("odd.tgz");
        fs::write(&archive, gzip_bytes(b"just text")).unwrap();
        let dest = temp.path().join("out");
        fs::create_dir(&dest).unwrap();

        let result = extract(&archive, &dest);

        assert!(matches!(result, Err(ArchiveError::NotAnArchive { .. })));
    }

    #[test]
    fn test_truncated_zip_is_not_an_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("cut.zip");
        // A local file header signature with nothing behind it.
        fs::write(&archive, [0x50, 0x4B, 0x03, 0x04, 0x14, 0x00, 0x00, 0x00]).unwrap();
        let dest = temp.path().join("out");
        fs::create_dir(&dest).unwrap();

        let result = extract(&archive, &dest);

        assert!(matches!(result, Err(ArchiveError::NotAnArchive { .. })));
    }

    #[test]
    fn test_handle_archive_unpacks_into_normalized_folder() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("Мої фото.zip");
        write_zip(&archive, &[("cat.png", b"png")]);
        let target = temp.path().join("ARCHIVES");

        let outcome = handle_archive(&entry_for(&archive), &target, TransferMode::Copy).unwrap();

        let folder = target.join("Moji_foto");
        assert_eq!(
            outcome,
            Outcome::Extracted {
                folder: folder.clone()
            }
        );
        assert!(folder.join("cat.png").exists());
        assert!(archive.exists());
    }

    #[test]
    fn test_handle_archive_rolls_back_folder_for_fake_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("archive.zip");
        fs::write(&archive, b"not really a zip").unwrap();
        let target = temp.path().join("ARCHIVES");

        let outcome = handle_archive(&entry_for(&archive), &target, TransferMode::Move).unwrap();

        assert!(matches!(outcome, Outcome::NotAnArchive { .. }));
        assert!(!target.join("archive").exists());
        assert!(archive.exists(), "a rejected archive is never removed");
    }

    #[test]
    fn test_handle_archive_move_removes_source() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("data.tar");
        fs::write(&archive, tar_bytes(&[("row.csv", b"1,2")])).unwrap();
        let target = temp.path().join("ARCHIVES");

        handle_archive(&entry_for(&archive), &target, TransferMode::Move).unwrap();

        assert!(!archive.exists());
        assert!(target.join("data").join("row.csv").exists());
    }

    fn assert_left_empty(target: &Path) {
        let leftovers: Vec<_> = fs::read_dir(target)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert!(leftovers.is_empty(), "leftovers: {:?}", leftovers);
    }

    #[test]
    fn test_handle_archive_corrupt_gzip_body_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("archive.gz");
        let mut data = vec![0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff];
        data.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x13, 0x37, 0x00, 0xff, 0xfe, 0xfd]);
        fs::write(&archive, data).unwrap();
        let target = temp.path().join("ARCHIVES");

        let outcome = handle_archive(&entry_for(&archive), &target, TransferMode::Copy).unwrap();

        assert!(matches!(outcome, Outcome::NotAnArchive { .. }));
        assert_left_empty(&target);
    }

    #[test]
    fn test_handle_archive_corrupt_zip_member_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("archive.zip");
        let payload: &[u8] = b"the quick brown fox jumps over the lazy dog";
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        zip.start_file("fox.txt", options).unwrap();
        zip.write_all(payload).unwrap();
        let mut bytes = zip.finish().unwrap().into_inner();
        let at = bytes
            .windows(payload.len())
            .position(|w| w == payload)
            .unwrap();
        bytes[at + 4] ^= 0xff;
        fs::write(&archive, bytes).unwrap();
        let target = temp.path().join("ARCHIVES");

        let outcome = handle_archive(&entry_for(&archive), &target, TransferMode::Move).unwrap();

        assert!(matches!(outcome, Outcome::NotAnArchive { .. }));
        assert_left_empty(&target);
        assert!(archive.exists());
    }

    #[test]
    fn test_handle_archive_truncated_tar_is_rejected() {
        let temp = TempDir::new().unwrap();
        let big = vec![b'x'; 4096];
        let mut tar_data = tar_bytes(&[("big.bin", &big)]);
        tar_data.truncate(1024);
        let plain = temp.path().join("cut.tar");
        fs::write(&plain, &tar_data).unwrap();
        let packed = temp.path().join("cut.tar.gz");
        fs::write(&packed, gzip_bytes(&tar_data)).unwrap();

        for archive in [&plain, &packed] {
            let target = temp.path().join(format!(
                "{}_ARCHIVES",
                archive.file_name().unwrap().to_string_lossy()
            ));
            let outcome = handle_archive(&entry_for(archive), &target, TransferMode::Copy);
            assert!(
                matches!(outcome, Ok(Outcome::NotAnArchive { .. })),
                "{} should be rejected, got {:?}",
                archive.display(),
                outcome
            );
            assert_left_empty(&target);
        }
    }

    #[test]
    fn test_archives_with_same_folder_are_merged() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("my pics.zip");
        write_zip(&first, &[("a.txt", b"a"), ("shared/x.txt", b"old")]);
        let second = temp.path().join("my_pics.zip");
        write_zip(&second, &[("b.txt", b"b"), ("shared/x.txt", b"new")]);
        let target = temp.path().join("ARCHIVES");

        handle_archive(&entry_for(&first), &target, TransferMode::Copy).unwrap();
        handle_archive(&entry_for(&second), &target, TransferMode::Copy).unwrap();

        let folder = target.join("my_pics");
        assert!(folder.join("a.txt").exists());
        assert!(folder.join("b.txt").exists());
        assert_eq!(fs::read(folder.join("shared/x.txt")).unwrap(), b"new");
        let names: Vec<_> = fs::read_dir(&target)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("my_pics")]);
    }
}
