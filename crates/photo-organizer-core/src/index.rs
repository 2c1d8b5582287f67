//! The set of fingerprints already stored in an archive.
//!
//! The index is loaded from a JSON snapshot directly under the archive root,
//! or reconstructed by hashing every file in the archive when the snapshot is
//! missing or unusable. Snapshots are written to a staging file and renamed
//! into place, so readers never observe a half-written snapshot.
//!
//! Between snapshots every placement is appended to a hidden journal next to
//! the snapshot. Loading merges the journal into the snapshot, so content
//! copied after the last snapshot is still known after an unclean stop.

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::discovery::{is_hidden_name, STAGING_PREFIX, STAGING_SUFFIX};
use crate::error::{Error, Result};
use crate::hasher;
use crate::logging::log_hash_error;
use crate::types::Fingerprint;

const SNAPSHOT_FORMAT: &str = "photo-organizer-index";
const SNAPSHOT_VERSION: u32 = 1;
const SNAPSHOT_ALGORITHM: &str = "blake3";
const JOURNAL_SUFFIX: &str = ".journal";

/// On-disk snapshot document
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    format: String,
    version: u32,
    algorithm: String,
    count: usize,
    fingerprints: Vec<Fingerprint>,
}

/// Fingerprints of all content present in an archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveIndex {
    fingerprints: HashSet<Fingerprint>,
}

/// Location of the snapshot for an archive root
pub fn snapshot_path(archive_root: &Path, index_file_name: &str) -> PathBuf {
    archive_root.join(index_file_name)
}

/// Location of the placement journal; hidden so it is never archive content
pub fn journal_path(archive_root: &Path, index_file_name: &str) -> PathBuf {
    archive_root.join(format!(".{}{}", index_file_name, JOURNAL_SUFFIX))
}

impl ArchiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the persisted snapshot, rebuilding from the archive if there is none
    ///
    /// Returns `Error::IndexCorrupt` when a snapshot exists but cannot be used.
    pub fn load(archive_root: &Path, index_file_name: &str) -> Result<Self> {
        let path = snapshot_path(archive_root, index_file_name);

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No index snapshot at {}, rebuilding", path.display());
                return Self::rebuild(archive_root, index_file_name);
            }
            Err(e) => {
                return Err(Error::IndexCorrupt {
                    path,
                    reason: format!("unreadable: {}", e),
                })
            }
        };

        let corrupt = |reason: String| Error::IndexCorrupt {
            path: path.clone(),
            reason,
        };

        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| corrupt(e.to_string()))?;

        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(corrupt(format!("unknown format {:?}", snapshot.format)));
        }
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(corrupt(format!("unsupported version {}", snapshot.version)));
        }
        if snapshot.algorithm != SNAPSHOT_ALGORITHM {
            return Err(corrupt(format!(
                "unsupported algorithm {:?}",
                snapshot.algorithm
            )));
        }
        if snapshot.count != snapshot.fingerprints.len() {
            return Err(corrupt(format!(
                "expected {} fingerprints, found {}",
                snapshot.count,
                snapshot.fingerprints.len()
            )));
        }

        let mut index = Self {
            fingerprints: snapshot.fingerprints.into_iter().collect(),
        };
        let journaled = read_journal(&journal_path(archive_root, index_file_name))?;
        if !journaled.is_empty() {
            info!("Replaying {} journaled placements", journaled.len());
            index.fingerprints.extend(journaled);
        }
        info!(
            "Loaded {} fingerprints from {}",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    /// Load the snapshot, falling back to a full rebuild if it is corrupt
    pub fn load_or_rebuild(archive_root: &Path, index_file_name: &str) -> Result<Self> {
        match Self::load(archive_root, index_file_name) {
            Err(Error::IndexCorrupt { path, reason }) => {
                warn!(
                    "Ignoring corrupt index {} ({}), rebuilding from archive",
                    path.display(),
                    reason
                );
                Self::rebuild(archive_root, index_file_name)
            }
            other => other,
        }
    }

    /// Fingerprint every file under the archive root
    ///
    /// The snapshot itself, staging files and hidden files are not archive
    /// content and are skipped. A missing root yields an empty index.
    pub fn rebuild(archive_root: &Path, index_file_name: &str) -> Result<Self> {
        if !archive_root.exists() {
            return Ok(Self::new());
        }

        let snapshot = snapshot_path(archive_root, index_file_name);
        let mut paths = Vec::new();

        for entry in WalkDir::new(archive_root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden_name(e.file_name()))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable archive entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || entry.path() == snapshot {
                continue;
            }
            paths.push(entry.into_path());
        }

        let fingerprints: HashSet<Fingerprint> = paths
            .par_iter()
            .filter_map(|path| match hasher::fingerprint(path) {
                Ok(fp) => Some(fp),
                Err(e) => {
                    log_hash_error(path, &e);
                    None
                }
            })
            .collect();

        info!(
            "Rebuilt index from {} archive files ({} distinct)",
            paths.len(),
            fingerprints.len()
        );
        Ok(Self { fingerprints })
    }

    /// Pure membership test
    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.fingerprints.contains(fp)
    }

    /// Record a fingerprint; adding an existing one is a no-op
    pub fn add(&mut self, fp: Fingerprint) {
        self.insert(fp);
    }

    /// Insert if absent, returning whether the fingerprint was new
    pub fn insert(&mut self, fp: Fingerprint) -> bool {
        self.fingerprints.insert(fp)
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fingerprint> {
        self.fingerprints.iter()
    }

    /// Atomically replace the snapshot under the archive root
    pub fn persist(&self, archive_root: &Path, index_file_name: &str) -> Result<()> {
        let path = snapshot_path(archive_root, index_file_name);

        let mut fingerprints: Vec<Fingerprint> = self.fingerprints.iter().copied().collect();
        fingerprints.sort();

        let snapshot = Snapshot {
            format: SNAPSHOT_FORMAT.to_string(),
            version: SNAPSHOT_VERSION,
            algorithm: SNAPSHOT_ALGORITHM.to_string(),
            count: fingerprints.len(),
            fingerprints,
        };

        let mut staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(archive_root)?;

        {
            let mut writer = BufWriter::new(staging.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &snapshot)
                .map_err(|e| Error::Io(e.into()))?;
            writer.flush()?;
        }
        staging.as_file().sync_all()?;
        staging.persist(&path).map_err(|e| Error::Io(e.error))?;

        debug!(
            "Persisted {} fingerprints to {}",
            snapshot.count,
            path.display()
        );
        Ok(())
    }
}

/// Read every fingerprint in a journal; a missing journal is empty
///
/// Any unparsable line, including one cut short by a crash, makes the index
/// unusable so the caller rebuilds from the archive.
fn read_journal(path: &Path) -> Result<Vec<Fingerprint>> {
    let corrupt = |reason: String| Error::IndexCorrupt {
        path: path.to_path_buf(),
        reason,
    };

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(corrupt(format!("unreadable journal: {}", e))),
    };

    let mut fingerprints = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| corrupt(format!("journal line {}: {}", n + 1, e)))?;
        let fp = line
            .parse::<Fingerprint>()
            .map_err(|e| corrupt(format!("journal line {}: {}", n + 1, e)))?;
        fingerprints.push(fp);
    }
    Ok(fingerprints)
}

/// Append-only record of fingerprints placed since the last snapshot
#[derive(Debug)]
pub struct Journal {
    file: File,
    path: PathBuf,
}

impl Journal {
    /// Open the journal for appending, creating it if needed
    pub fn open(archive_root: &Path, index_file_name: &str) -> Result<Self> {
        let path = journal_path(archive_root, index_file_name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| Error::ArchiveInit {
                path: path.clone(),
                source,
            })?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably append one placed fingerprint
    pub fn record(&mut self, fp: &Fingerprint) -> Result<()> {
        self.file.write_all(format!("{}\n", fp).as_bytes())?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Drop all entries; only call once a snapshot covering them is persisted
    pub fn clear(&mut self) -> Result<()> {
        let truncated = File::create(&self.path)?;
        truncated.sync_all()?;
        Ok(())
    }
}

impl FromIterator<Fingerprint> for ArchiveIndex {
    fn from_iter<I: IntoIterator<Item = Fingerprint>>(iter: I) -> Self {
        Self {
            fingerprints: iter.into_iter().collect(),
        }
    }
}
