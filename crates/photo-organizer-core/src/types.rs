use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Content fingerprint used for deduplication (BLAKE3, 32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex representation
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl From<blake3::Hash> for Fingerprint {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Error returned when a string is not a 64-character hex digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFingerprintError(String);

impl fmt::Display for ParseFingerprintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid fingerprint {:?}", self.0)
    }
}

impl std::error::Error for ParseFingerprintError {}

impl FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        blake3::Hash::from_hex(s)
            .map(Self::from)
            .map_err(|_| ParseFingerprintError(s.to_string()))
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = ParseFingerprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.to_hex()
    }
}

/// Point in time a photo was taken, as read from its metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CaptureTimestamp(NaiveDateTime);

impl CaptureTimestamp {
    /// Format used for archive file names; periods keep it valid on every filesystem
    pub const FILE_STEM_FORMAT: &'static str = "%Y-%m-%d %H.%M.%S";

    pub fn new(datetime: NaiveDateTime) -> Self {
        Self(datetime)
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// Relative `YYYY/MM/DD` directory
    pub fn directory(&self) -> PathBuf {
        let date = self.0.date();
        PathBuf::from(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!("{:02}", date.day()))
    }

    /// Sortable date-time file stem, e.g. `2021-06-15 10.30.00`
    pub fn file_stem(&self) -> String {
        self.0.format(Self::FILE_STEM_FORMAT).to_string()
    }
}

/// Directory and file name a source file will be copied to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementTarget {
    /// Absolute directory under the archive root
    pub directory: PathBuf,

    /// File name before collision resolution, byte-exact for undated files
    pub file_name: OsString,
}

impl PlacementTarget {
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Counters for a single organize run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Files visited in the source tree (hidden files excluded)
    pub total_files: usize,

    /// Files copied into the archive
    pub uniques_found: usize,

    /// Files whose content was already archived
    pub dupes_found: usize,

    /// Files that could not be hashed or copied
    pub errors: usize,

    /// Whether the run stopped early on request
    pub interrupted: bool,
}

impl RunSummary {
    pub fn is_consistent(&self) -> bool {
        self.uniques_found + self.dupes_found + self.errors == self.total_files
    }

    pub fn is_clean(&self) -> bool {
        self.errors == 0 && !self.interrupted
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files, {} uniques, {} dupes, {} errors",
            self.total_files, self.uniques_found, self.dupes_found, self.errors
        )?;
        if self.interrupted {
            write!(f, " (interrupted)")?;
        }
        Ok(())
    }
}
