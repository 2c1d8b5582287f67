use photo_organizer_core::discovery::is_hidden_name;
use photo_organizer_core::{Config, MetadataError, Organizer, TagExtractor};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Tag extractor that answers from a table keyed by file name
///
/// Files not in the table fail extraction, like a non-image would.
#[derive(Default, Clone)]
pub struct TableTags {
    dates: HashMap<String, String>,
}

impl TableTags {
    pub fn with_date(mut self, file_name: &str, value: &str) -> Self {
        self.dates.insert(file_name.to_string(), value.to_string());
        self
    }
}

impl TagExtractor for TableTags {
    fn extract(&self, path: &Path) -> Result<HashMap<String, String>, MetadataError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self.dates.get(&name) {
            Some(value) => {
                let mut tags = HashMap::new();
                tags.insert("DateTimeOriginal".to_string(), value.clone());
                tags.insert("Model".to_string(), "Test Camera".to_string());
                Ok(tags)
            }
            None => Err(MetadataError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "no EXIF",
            ))),
        }
    }
}

pub fn quiet_config() -> Config {
    Config {
        show_progress: false,
        threads: 2,
        batch_size: 3,
        ..Config::default()
    }
}

pub fn organizer(tags: TableTags) -> Organizer<TableTags> {
    Organizer::with_extractor(quiet_config(), tags)
}

pub fn write_file(path: &Path, content: &[u8]) -> PathBuf {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
    path.to_path_buf()
}

/// All archive files except the index snapshot and hidden bookkeeping files,
/// relative to the root
pub fn archive_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && !is_hidden_name(e.file_name()))
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .filter(|p| p != Path::new("hashes.json"))
        .collect();
    files.sort();
    files
}
