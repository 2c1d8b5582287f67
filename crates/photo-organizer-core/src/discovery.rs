use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::error::{Error, Result};

/// Prefix of in-flight files written into the archive; always hidden
pub const STAGING_PREFIX: &str = ".photo-organizer-";

/// Suffix of in-flight files written into the archive
pub const STAGING_SUFFIX: &str = ".partial";

/// Returns if the file name marks a hidden file
///
/// Only the first raw byte is looked at, so names that are not valid UTF-8
/// are classified the same way.
pub fn is_hidden_name(name: &OsStr) -> bool {
    name.as_encoded_bytes().first() == Some(&b'.')
}

fn is_hidden(entry: &DirEntry) -> bool {
    is_hidden_name(entry.file_name())
}

/// Walks a source tree and yields the files to organize, in a stable order
///
/// Directories are not yielded. Hidden files are skipped when configured, and
/// an archive root nested inside the source tree is pruned entirely.
pub struct SourceWalker {
    inner: walkdir::IntoIter,
    excluded: Option<PathBuf>,
    skip_hidden: bool,
}

impl SourceWalker {
    pub fn new(source: &Path, archive_root: Option<&Path>, config: &Config) -> Self {
        let inner = WalkDir::new(source)
            .follow_links(config.follow_links)
            .sort_by_file_name()
            .into_iter();

        Self {
            inner,
            excluded: archive_root.and_then(|root| root.canonicalize().ok()),
            skip_hidden: config.skip_hidden,
        }
    }

    fn is_excluded_dir(&self, entry: &DirEntry) -> bool {
        match &self.excluded {
            Some(excluded) => entry
                .path()
                .canonicalize()
                .map(|p| &p == excluded)
                .unwrap_or(false),
            None => false,
        }
    }
}

impl Iterator for SourceWalker {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(Error::Walk(e))),
            };

            if entry.file_type().is_dir() {
                if entry.depth() > 0 && self.is_excluded_dir(&entry) {
                    log::info!("Skipping archive directory: {}", entry.path().display());
                    self.inner.skip_current_dir();
                }
                continue;
            }

            if self.skip_hidden && is_hidden(&entry) {
                continue;
            }

            return Some(Ok(entry.into_path()));
        }
    }
}

/// Count the files a walk would yield, for progress reporting
///
/// Walk errors are counted too, since each one is reported as a per-file error.
pub fn count_files(source: &Path, archive_root: Option<&Path>, config: &Config) -> usize {
    SourceWalker::new(source, archive_root, config).count()
}

// -- Tests --
