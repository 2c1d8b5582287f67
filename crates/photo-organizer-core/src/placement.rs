//! Destination derivation and collision-safe copying into the archive.
//!
//! Dated files go to `YYYY/MM/DD/<YYYY-MM-DD HH.MM.SS>.<ext>`, everything else
//! to `no_metadata/<original name>`. Bytes are streamed into a hidden staging
//! file in the destination directory and only linked to the final name once
//! they are synced; an existing file at the final name is never replaced.

use log::debug;
use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use crate::discovery::{STAGING_PREFIX, STAGING_SUFFIX};
use crate::error::{Error, Result};
use crate::logging::log_fs_modification;
use crate::types::{CaptureTimestamp, PlacementTarget};

/// Attempts at finding a free name before giving up
const MAX_NAME_ATTEMPTS: usize = 8;

/// Separator between a base name and its collision token
pub const COLLISION_SEPARATOR: &str = " ";

/// Computes destinations and copies files into one archive root
#[derive(Debug, Clone)]
pub struct Placer {
    archive_root: PathBuf,
    no_metadata_dir: String,
}

impl Placer {
    pub fn new(archive_root: impl Into<PathBuf>, no_metadata_dir: impl Into<String>) -> Self {
        Self {
            archive_root: archive_root.into(),
            no_metadata_dir: no_metadata_dir.into(),
        }
    }

    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    /// Destination before collision resolution
    pub fn target(&self, source: &Path, timestamp: Option<&CaptureTimestamp>) -> PlacementTarget {
        let original_name = source.file_name().unwrap_or_default();

        match timestamp {
            Some(ts) => {
                let mut file_name = OsString::from(ts.file_stem());
                if let (_, Some(ext)) = split_extension(original_name) {
                    file_name.push(".");
                    match ext.to_str() {
                        Some(ext) => file_name.push(ext.to_lowercase()),
                        None => file_name.push(ext),
                    }
                }
                PlacementTarget {
                    directory: self.archive_root.join(ts.directory()),
                    file_name,
                }
            }
            None => PlacementTarget {
                directory: self.archive_root.join(&self.no_metadata_dir),
                file_name: original_name.to_os_string(),
            },
        }
    }

    /// Copy `source` into the archive and return the final path
    ///
    /// On error nothing is left at the destination: the staging file is
    /// removed when it is dropped.
    pub fn place(&self, source: &Path, timestamp: Option<&CaptureTimestamp>) -> Result<PathBuf> {
        let target = self.target(source, timestamp);
        let copy_error = |destination: &Path, source_err: io::Error| Error::Copy {
            source_path: source.to_path_buf(),
            destination: destination.to_path_buf(),
            source: source_err,
        };

        fs::create_dir_all(&target.directory).map_err(|e| copy_error(&target.directory, e))?;

        let mut staging = self
            .stage(source, &target.directory)
            .map_err(|e| copy_error(&target.path(), e))?;

        let mut candidate = target.path();
        if candidate.exists() {
            candidate = target.directory.join(with_unique_token(&target.file_name));
        }

        for _ in 0..MAX_NAME_ATTEMPTS {
            match staging.persist_noclobber(&candidate) {
                Ok(_) => {
                    log_fs_modification(
                        "copy",
                        &candidate,
                        Some(&format!("from {}", source.display())),
                    );
                    return Ok(candidate);
                }
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("{} already exists, picking another name", candidate.display());
                    staging = e.file;
                    candidate = target.directory.join(with_unique_token(&target.file_name));
                }
                Err(e) => return Err(copy_error(&candidate, e.error)),
            }
        }

        Err(copy_error(
            &candidate,
            io::Error::new(io::ErrorKind::AlreadyExists, "no free file name"),
        ))
    }

    /// Write the source bytes to a synced staging file in `directory`
    fn stage(&self, source: &Path, directory: &Path) -> io::Result<tempfile::NamedTempFile> {
        let input = File::open(source)?;
        let permissions = input.metadata()?.permissions();

        let mut staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(directory)?;

        io::copy(&mut BufReader::new(input), staging.as_file_mut())?;
        staging.as_file().set_permissions(permissions)?;
        staging.as_file().sync_all()?;

        Ok(staging)
    }
}

/// Split a file name into stem and extension (without its dot)
///
/// A leading dot does not start an extension, and a name without a dot has
/// no extension. Non-UTF-8 names are split on their raw bytes.
pub fn split_extension(file_name: &OsStr) -> (&OsStr, Option<&OsStr>) {
    let path = Path::new(file_name);
    match path.file_stem() {
        Some(stem) => (stem, path.extension()),
        None => (file_name, None),
    }
}

/// `<stem> <uuid>.<ext>`
pub fn with_unique_token(file_name: &OsStr) -> OsString {
    let (stem, ext) = split_extension(file_name);
    let mut unique = stem.to_os_string();
    unique.push(COLLISION_SEPARATOR);
    unique.push(uuid::Uuid::new_v4().to_string());
    if let Some(ext) = ext {
        unique.push(".");
        unique.push(ext);
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::parse_capture_date;
    use tempfile::tempdir;

    fn write(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_split_extension() {
        let split = |name: &'static str| split_extension(OsStr::new(name));
        assert_eq!(split("IMG_1.JPG"), (OsStr::new("IMG_1"), Some(OsStr::new("JPG"))));
        assert_eq!(
            split("archive.tar.gz"),
            (OsStr::new("archive.tar"), Some(OsStr::new("gz")))
        );
        assert_eq!(split("README"), (OsStr::new("README"), None));
        assert_eq!(split(".profile"), (OsStr::new(".profile"), None));
    }

    #[test]
    fn test_target_with_timestamp() {
        let placer = Placer::new("/archive", "no_metadata");
        let ts = parse_capture_date("2021:06:15 10:30:00").unwrap();

        let target = placer.target(Path::new("/src/IMG_0042.JPG"), Some(&ts));
        assert_eq!(target.directory, PathBuf::from("/archive/2021/06/15"));
        assert_eq!(target.file_name, "2021-06-15 10.30.00.jpg");
    }

    #[test]
    fn test_target_with_timestamp_and_no_extension() {
        let placer = Placer::new("/archive", "no_metadata");
        let ts = parse_capture_date("2021:06:15 10:30:00").unwrap();

        let target = placer.target(Path::new("/src/RAW0001"), Some(&ts));
        assert_eq!(target.file_name, "2021-06-15 10.30.00");
    }

    #[test]
    fn test_target_without_timestamp_keeps_name() {
        let placer = Placer::new("/archive", "no_metadata");

        let target = placer.target(Path::new("/src/deep/Scan 3.PNG"), None);
        assert_eq!(target.directory, PathBuf::from("/archive/no_metadata"));
        assert_eq!(target.file_name, "Scan 3.PNG");
    }

    #[test]
    fn test_unique_token_preserves_extension() {
        let name = with_unique_token(OsStr::new("2021-06-15 10.30.00.jpg"));
        let name = name.to_str().unwrap();
        assert!(name.starts_with("2021-06-15 10.30.00 "));
        assert!(name.ends_with(".jpg"));
        // stem + separator + 36-char uuid + ext
        assert_eq!(name.len(), "2021-06-15 10.30.00".len() + 1 + 36 + 4);
    }

    #[test]
    fn test_place_copies_bytes() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src/photo.jpg");
        write(&source, b"pixels");
        let placer = Placer::new(dir.path().join("archive"), "no_metadata");

        let dest = placer.place(&source, None).unwrap();
        assert_eq!(dest, dir.path().join("archive/no_metadata/photo.jpg"));
        assert_eq!(fs::read(&dest).unwrap(), b"pixels");
        assert!(source.exists());
    }

    #[test]
    fn test_place_zero_length_file() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src/empty");
        write(&source, b"");
        let placer = Placer::new(dir.path().join("archive"), "no_metadata");

        let dest = placer.place(&source, None).unwrap();
        assert_eq!(fs::metadata(&dest).unwrap().len(), 0);
    }

    #[test]
    fn test_place_collision_never_overwrites() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("archive");
        let existing = archive.join("2021/06/15/2021-06-15 10.30.00.jpg");
        write(&existing, b"first");

        let source = dir.path().join("src/IMG_2.JPG");
        write(&source, b"second");

        let ts = parse_capture_date("2021:06:15 10:30:00").unwrap();
        let placer = Placer::new(&archive, "no_metadata");
        let dest = placer.place(&source, Some(&ts)).unwrap();

        assert_ne!(dest, existing);
        assert_eq!(dest.parent(), existing.parent());
        let name = dest.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("2021-06-15 10.30.00 "));
        assert!(name.ends_with(".jpg"));

        assert_eq!(fs::read(&existing).unwrap(), b"first");
        assert_eq!(fs::read(&dest).unwrap(), b"second");
    }

    #[test]
    fn test_place_leaves_no_staging_files() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src/a.jpg");
        write(&source, b"a");
        let placer = Placer::new(dir.path().join("archive"), "no_metadata");
        placer.place(&source, None).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path().join("archive/no_metadata"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg".to_string()]);
    }

    #[test]
    fn test_place_missing_source_is_copy_error() {
        let dir = tempdir().unwrap();
        let placer = Placer::new(dir.path().join("archive"), "no_metadata");

        let result = placer.place(&dir.path().join("missing.jpg"), None);
        assert!(matches!(result, Err(Error::Copy { .. })));
        assert!(!dir.path().join("archive/no_metadata/missing.jpg").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_target_keeps_non_utf8_name_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let placer = Placer::new("/archive", "no_metadata");
        let name = OsStr::from_bytes(b"caf\xe9.jpg");
        let source = Path::new("/src").join(name);

        let target = placer.target(&source, None);
        assert_eq!(target.file_name.as_os_str(), name);

        let ts = parse_capture_date("2021:06:15 10:30:00").unwrap();
        let odd_ext = Path::new("/src").join(OsStr::from_bytes(b"IMG.J\xe9G"));
        let dated = placer.target(&odd_ext, Some(&ts));
        assert_eq!(
            dated.file_name.as_bytes(),
            b"2021-06-15 10.30.00.J\xe9G".as_slice()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_place_collision_on_non_utf8_name_keeps_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let archive = dir.path().join("archive");
        let name = OsStr::from_bytes(b"caf\xe9.jpg");
        write(&archive.join("no_metadata").join(name), b"first");
        let source = dir.path().join("src").join(name);
        write(&source, b"second");

        let placer = Placer::new(&archive, "no_metadata");
        let dest = placer.place(&source, None).unwrap();

        let placed = dest.file_name().unwrap().as_bytes();
        assert!(placed.starts_with(b"caf\xe9 "));
        assert!(placed.ends_with(b".jpg"));
        assert_eq!(fs::read(&dest).unwrap(), b"second");
        assert_eq!(fs::read(archive.join("no_metadata").join(name)).unwrap(), b"first");
    }
}
