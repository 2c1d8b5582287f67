use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Optional per-archive configuration file, hidden so it is never archived
pub const CONFIG_FILE_NAME: &str = ".photo-organizer.json";

/// Log level for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Configuration for an organize run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the index snapshot directly under the archive root
    pub index_file_name: String,

    /// Directory under the archive root for files without a capture date
    pub no_metadata_dir: String,

    /// Whether to skip files whose name starts with a dot
    pub skip_hidden: bool,

    /// Whether to follow symbolic links while walking the source tree
    pub follow_links: bool,

    /// Number of threads to use for hashing (0 = auto)
    pub threads: usize,

    /// Number of files hashed together before placement decisions are made
    pub batch_size: usize,

    /// Fold the placement journal into a fresh snapshot after this many new
    /// placements (0 = only at the end of the run)
    pub checkpoint_interval: usize,

    /// Whether to draw a progress bar
    pub show_progress: bool,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_file_name: "hashes.json".to_string(),
            no_metadata_dir: "no_metadata".to_string(),
            skip_hidden: true,
            follow_links: true,
            threads: 0, // Auto
            batch_size: 64,
            checkpoint_interval: 100,
            show_progress: true,
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Configuration(format!("Failed to open config file: {}", e)))?;

        let config: Config = serde_json::from_reader(file)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Location of the optional configuration file of an archive
    pub fn archive_config_path(archive_root: &Path) -> PathBuf {
        archive_root.join(CONFIG_FILE_NAME)
    }

    /// Load the archive's configuration file, or defaults if it has none
    pub fn for_archive(archive_root: &Path) -> Result<Self> {
        let path = Self::archive_config_path(archive_root);
        if path.is_file() {
            log::debug!("Loading configuration from {}", path.display());
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| Error::Configuration(format!("Failed to create config file: {}", e)))?;

        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !is_plain_file_name(&self.index_file_name) {
            return Err(Error::Configuration(format!(
                "Index file name must be a single path component: {:?}",
                self.index_file_name
            )));
        }

        if !is_plain_file_name(&self.no_metadata_dir) {
            return Err(Error::Configuration(format!(
                "No-metadata directory must be a single path component: {:?}",
                self.no_metadata_dir
            )));
        }

        // Date directories are all digits, so a numeric name would mix the two trees
        if self.no_metadata_dir.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Configuration(
                "No-metadata directory must not be purely numeric".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(Error::Configuration(
                "Batch size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Worker count for the hashing pool
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.index_file_name, "hashes.json");
        assert_eq!(config.no_metadata_dir, "no_metadata");
        assert!(config.skip_hidden);
    }

    #[test]
    fn test_validate_rejects_nested_names() {
        let mut config = Config::default();
        config.index_file_name = "sub/hashes.json".to_string();
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let mut config = Config::default();
        config.no_metadata_dir = "..".to_string();
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let mut config = Config::default();
        config.no_metadata_dir = "2021".to_string();
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut config = Config::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("organizer.json");

        let mut config = Config::default();
        config.checkpoint_interval = 7;
        config.show_progress = false;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.checkpoint_interval, 7);
        assert!(!loaded.show_progress);
        assert_eq!(loaded.index_file_name, config.index_file_name);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("organizer.json");
        std::fs::write(&path, r#"{ "threads": 2 }"#).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.threads, 2);
        assert_eq!(loaded.effective_threads(), 2);
        assert_eq!(loaded.batch_size, Config::default().batch_size);
    }

    #[test]
    fn test_unparseable_config_is_configuration_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("organizer.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            Config::from_file(&path),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_for_archive_without_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::for_archive(&dir.path().join("not-created-yet")).unwrap();
        assert_eq!(config.index_file_name, "hashes.json");
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_for_archive_reads_hidden_config_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"no_metadata_dir": "undated", "log_level": "Warn"}"#,
        )
        .unwrap();

        let config = Config::for_archive(dir.path()).unwrap();
        assert_eq!(config.no_metadata_dir, "undated");
        assert_eq!(config.log_level.as_filter(), log::LevelFilter::Warn);
        assert!(config.validate().is_ok());
    }
}
