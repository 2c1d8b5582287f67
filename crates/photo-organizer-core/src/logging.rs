use log::{error, info};
use std::path::Path;

use crate::config::LogLevel;
use crate::progress::ConsoleWriter;

/// Environment variable that overrides the configured log filter
pub const LOG_ENV_VAR: &str = "PHOTO_ORGANIZER_LOG";

/// Initialize the logger with timestamp, log level, and module path
/// Falls back to `default_level` unless `PHOTO_ORGANIZER_LOG` is set.
/// Records are written through the progress console so they do not
/// interleave with a drawn bar.
pub fn init_logger(default_level: LogLevel) -> Result<(), log::SetLoggerError> {
    env_logger::Builder::new()
        .filter_level(default_level.as_filter())
        .parse_env(env_logger::Env::default().filter(LOG_ENV_VAR))
        .format_timestamp_secs()
        .format_module_path(true)
        .target(env_logger::Target::Pipe(Box::new(ConsoleWriter)))
        .try_init()?;

    info!("Photo organizer started");
    Ok(())
}

/// Log file operation that failed
pub fn log_file_error(path: &Path, operation: &str, error: &dyn std::error::Error) {
    error!(
        "File operation failed - Operation: {}, Path: {}, Error: {}",
        operation,
        path.display(),
        error
    );
}

/// Log hash computation error
pub fn log_hash_error(path: &Path, error: &dyn std::error::Error) {
    error!(
        "Hash computation failed - Path: {}, Error: {}",
        path.display(),
        error
    );
}

/// Log file system modification
pub fn log_fs_modification(operation: &str, path: &Path, details: Option<&str>) {
    let details_str = details.unwrap_or("");
    info!(
        "FS CHANGE - Operation: {}, Path: {}{}",
        operation,
        path.display(),
        if details_str.is_empty() {
            "".to_string()
        } else {
            format!(", Details: {}", details_str)
        }
    );
}
