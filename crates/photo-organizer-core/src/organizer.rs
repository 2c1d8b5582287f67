//! Run orchestration: walk, hash, decide, place, checkpoint.
//!
//! Hashing of each batch runs in parallel on a dedicated pool. Decisions and
//! placements for a batch are then applied one file at a time in walk order,
//! so the membership check and the index update for a fingerprint form one
//! indivisible step, and a fingerprint is only recorded after its copy has
//! been synced to disk. Each recorded fingerprint is journaled right away and
//! the journal is folded into the snapshot every `checkpoint_interval`
//! placements.

use log::{debug, info, warn};
use rayon::prelude::*;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::discovery::{count_files, SourceWalker};
use crate::error::{Error, Result};
use crate::hasher;
use crate::index::{ArchiveIndex, Journal};
use crate::logging::{log_file_error, log_hash_error};
use crate::metadata::{ExifTagExtractor, MetadataResolver, TagExtractor};
use crate::placement::Placer;
use crate::progress::ProgressTracker;
use crate::types::{Fingerprint, RunSummary};

/// Phases of a run, logged as they are entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    IndexLoaded,
    Scanning,
    Persisting,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::IndexLoaded => "index loaded",
            Self::Scanning => "scanning",
            Self::Persisting => "persisting",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Placed(PathBuf),
    Duplicate,
    Failed,
}

/// Main entry point for organizing a source tree into an archive
pub struct Organizer<E = ExifTagExtractor> {
    config: Config,
    resolver: MetadataResolver<E>,
    shutdown_requested: Arc<AtomicBool>,
}

impl Organizer<ExifTagExtractor> {
    /// Create an Organizer that reads EXIF metadata
    pub fn new(config: Config) -> Self {
        Self::with_extractor(config, ExifTagExtractor)
    }
}

impl<E: TagExtractor> Organizer<E> {
    /// Create an Organizer with a custom tag extractor
    pub fn with_extractor(config: Config, extractor: E) -> Self {
        Self {
            config,
            resolver: MetadataResolver::new(extractor),
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flag that stops the run at the next file boundary when set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown_requested)
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Organize every file under `source` into `archive_root`
    pub fn run(&self, source: &Path, archive_root: &Path) -> Result<RunSummary> {
        self.config.validate()?;

        enter(RunState::Init);
        if !source.is_dir() {
            return Err(Error::SourceNotFound(source.to_path_buf()));
        }
        init_archive(archive_root)?;

        let index_name = self.config.index_file_name.as_str();
        let mut index = ArchiveIndex::load_or_rebuild(archive_root, index_name)?;

        // Start from a snapshot that covers everything known, with an empty journal
        let mut journal = Journal::open(archive_root, index_name)?;
        index.persist(archive_root, index_name)?;
        journal.clear()?;
        enter(RunState::IndexLoaded);
        info!(
            "Archive {} holds {} fingerprints",
            archive_root.display(),
            index.len()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.effective_threads())
            .thread_name(|i| format!("hasher-{}", i))
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build thread pool: {}", e)))?;

        enter(RunState::Scanning);
        let total = count_files(source, Some(archive_root), &self.config);
        info!("Found {} files in {}", total, source.display());

        let tracker = ProgressTracker::new(total, self.config.show_progress);
        let placer = Placer::new(archive_root, self.config.no_metadata_dir.as_str());
        let mut walker = SourceWalker::new(source, Some(archive_root), &self.config);
        let mut summary = RunSummary::default();
        let mut since_checkpoint = 0usize;

        'scan: loop {
            if self.shutdown_requested() {
                summary.interrupted = true;
                break;
            }

            let batch: Vec<Result<PathBuf>> =
                walker.by_ref().take(self.config.batch_size).collect();
            if batch.is_empty() {
                break;
            }

            let hashed: Vec<Result<(PathBuf, Fingerprint)>> = pool.install(|| {
                batch
                    .into_par_iter()
                    .map(|item| -> Result<(PathBuf, Fingerprint)> {
                        let path = item?;
                        let fp = hasher::fingerprint(&path)?;
                        Ok((path, fp))
                    })
                    .collect()
            });

            for item in hashed {
                if self.shutdown_requested() {
                    summary.interrupted = true;
                    break 'scan;
                }

                summary.total_files += 1;
                match self.process(item, &mut index, &mut journal, &placer) {
                    FileOutcome::Placed(_) => {
                        summary.uniques_found += 1;
                        since_checkpoint += 1;
                    }
                    FileOutcome::Duplicate => summary.dupes_found += 1,
                    FileOutcome::Failed => summary.errors += 1,
                }
                tracker.update(&summary);

                let interval = self.config.checkpoint_interval;
                if interval > 0 && since_checkpoint >= interval {
                    match index.persist(archive_root, index_name) {
                        Ok(()) => {
                            debug!("Checkpointed {} fingerprints", index.len());
                            since_checkpoint = 0;
                            clear_journal(&mut journal);
                        }
                        Err(e) => warn!("Index checkpoint failed, will retry: {}", e),
                    }
                }
            }
        }

        if summary.interrupted {
            warn!("Shutdown requested, stopping after {} files", summary.total_files);
        }

        enter(RunState::Persisting);
        index.persist(archive_root, index_name)?;
        clear_journal(&mut journal);

        tracker.finish(&summary);
        enter(RunState::Done);
        info!("Organize finished: {}", summary);

        Ok(summary)
    }

    /// Decide and, for new content, place one hashed file
    fn process(
        &self,
        item: Result<(PathBuf, Fingerprint)>,
        index: &mut ArchiveIndex,
        journal: &mut Journal,
        placer: &Placer,
    ) -> FileOutcome {
        let (path, fp) = match item {
            Ok(hashed) => hashed,
            Err(e) => {
                report_failure(&e);
                return FileOutcome::Failed;
            }
        };

        if index.contains(&fp) {
            debug!("Duplicate {} ({})", path.display(), fp);
            return FileOutcome::Duplicate;
        }

        let timestamp = self.resolver.resolve(&path);
        match placer.place(&path, timestamp.as_ref()) {
            Ok(dest) => {
                index.add(fp);
                if let Err(e) = journal.record(&fp) {
                    warn!("Could not journal {} ({}), relying on next checkpoint", fp, e);
                }
                FileOutcome::Placed(dest)
            }
            Err(e) => {
                report_failure(&e);
                FileOutcome::Failed
            }
        }
    }
}

fn enter(state: RunState) {
    debug!("Run state: {}", state);
}

/// Create the archive root if needed and check it is a directory
fn init_archive(archive_root: &Path) -> Result<()> {
    if archive_root.exists() && !archive_root.is_dir() {
        return Err(Error::ArchiveNotDirectory(archive_root.to_path_buf()));
    }

    fs::create_dir_all(archive_root).map_err(|source| Error::ArchiveInit {
        path: archive_root.to_path_buf(),
        source,
    })
}

/// Entries left behind are already in the snapshot, so a failure is harmless
fn clear_journal(journal: &mut Journal) {
    if let Err(e) = journal.clear() {
        warn!("Could not clear journal {}: {}", journal.path().display(), e);
    }
}

fn report_failure(error: &Error) {
    match error {
        Error::Hash { path, .. } => log_hash_error(path, error),
        Error::Copy { source_path, .. } => log_file_error(source_path, "copy", error),
        other => warn!("Skipping file: {}", other),
    }
}
