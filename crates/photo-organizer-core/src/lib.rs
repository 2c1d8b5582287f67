//! Core functionality for organizing photos into a deduplicated archive.
//!
//! This library provides the components of an organize run:
//! - Content fingerprinting and the persisted archive index
//! - Capture timestamps from embedded metadata
//! - Date-based placement with collision-safe copying
//! - Run orchestration with progress and checkpointing

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use config::{Config, LogLevel};
pub use error::{Error, Result};
pub use index::ArchiveIndex;
pub use metadata::{ExifTagExtractor, MetadataError, MetadataResolver, TagExtractor};
pub use organizer::{FileOutcome, Organizer, RunState};
pub use placement::Placer;
pub use types::*;

// -- Public Modules --
pub mod config;
pub mod discovery;
pub mod hasher;
pub mod index;
pub mod logging;
pub mod metadata;
pub mod organizer;
pub mod placement;
pub mod progress;
pub mod types;
