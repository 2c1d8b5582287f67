//! Capture timestamps from embedded metadata.
//!
//! Extraction is behind the [`TagExtractor`] trait. Missing, unreadable or
//! unparsable metadata is an expected outcome and always resolves to "no
//! timestamp"; it never fails a run.

use chrono::NaiveDateTime;
use log::{debug, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

use crate::types::CaptureTimestamp;

/// Tag holding the moment the picture was taken
pub const CAPTURE_DATE_TAG: &str = "DateTimeOriginal";

/// Layout of EXIF date values
pub const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Errors from a tag extractor
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),
}

/// Reads metadata tags from a file as name/value pairs
pub trait TagExtractor {
    fn extract(&self, path: &Path) -> Result<HashMap<String, String>, MetadataError>;
}

/// Tag extractor backed by `kamadak-exif`
///
/// Only primary-image fields are reported; thumbnail fields are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifTagExtractor;

impl TagExtractor for ExifTagExtractor {
    fn extract(&self, path: &Path) -> Result<HashMap<String, String>, MetadataError> {
        let mut reader = BufReader::new(File::open(path)?);
        let exif = exif::Reader::new().read_from_container(&mut reader)?;

        let tags = exif
            .fields()
            .filter(|field| field.ifd_num == exif::In::PRIMARY)
            .map(|field| (field.tag.to_string(), field_value(field)))
            .collect();

        Ok(tags)
    }
}

// ASCII values are kept raw so dates stay in their EXIF layout
fn field_value(field: &exif::Field) -> String {
    match &field.value {
        exif::Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default(),
        _ => field.display_value().to_string(),
    }
}

/// Parse an EXIF date value such as `2021:06:15 10:30:00`
pub fn parse_capture_date(value: &str) -> Option<CaptureTimestamp> {
    let trimmed = value.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    NaiveDateTime::parse_from_str(trimmed, EXIF_DATE_FORMAT)
        .ok()
        .map(CaptureTimestamp::new)
}

/// Derives capture timestamps using a tag extractor
#[derive(Debug, Clone, Default)]
pub struct MetadataResolver<E> {
    extractor: E,
}

impl<E: TagExtractor> MetadataResolver<E> {
    pub fn new(extractor: E) -> Self {
        Self { extractor }
    }

    /// Capture timestamp of the file, if its metadata has a usable one
    pub fn resolve(&self, path: &Path) -> Option<CaptureTimestamp> {
        let tags = match self.extractor.extract(path) {
            Ok(tags) => tags,
            Err(e) => {
                debug!("No metadata for {}: {}", path.display(), e);
                return None;
            }
        };

        let value = match tags.get(CAPTURE_DATE_TAG) {
            Some(value) => value,
            None => {
                debug!("No {} tag in {}", CAPTURE_DATE_TAG, path.display());
                return None;
            }
        };

        let timestamp = parse_capture_date(value);
        if timestamp.is_none() {
            warn!(
                "Unparsable {} {:?} in {}, treating as no metadata",
                CAPTURE_DATE_TAG,
                value,
                path.display()
            );
        }
        timestamp
    }
}
