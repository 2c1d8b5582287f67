use clap::Parser;
use log::{info, warn};
use photo_organizer_core::{logging, Config, Organizer};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

#[derive(Parser)]
#[command(name = "photo-organizer")]
#[command(about = "Copy photos into a deduplicated, date-structured archive")]
#[command(version)]
struct Cli {
    /// Directory with unorganized pictures
    source: PathBuf,

    /// Directory to copy organized pictures into
    archive: PathBuf,
}

/// Run completed, but some files could not be hashed or copied
const EXIT_FILE_ERRORS: u8 = 2;

/// Run stopped by Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Optional settings stored with the archive
    let config = match Config::for_archive(&cli.archive) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logger
    if let Err(e) = logging::init_logger(config.log_level) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    match run(cli, config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: Config) -> anyhow::Result<ExitCode> {
    let organizer = Organizer::new(config);

    // Stop at the next file boundary; the index is still persisted
    let shutdown = organizer.shutdown_handle();
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    })?;

    info!(
        "Organizing {} into {}",
        cli.source.display(),
        cli.archive.display()
    );
    let summary = organizer.run(&cli.source, &cli.archive)?;

    println!(
        "{}/{}, {} uniques, {} dupes, {} errors",
        summary.uniques_found + summary.dupes_found,
        summary.total_files,
        summary.uniques_found,
        summary.dupes_found,
        summary.errors
    );

    if summary.interrupted {
        warn!("Interrupted; rerun to continue where this run stopped");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    if summary.errors > 0 {
        warn!("{} files could not be organized, see log", summary.errors);
        return Ok(ExitCode::from(EXIT_FILE_ERRORS));
    }
    Ok(ExitCode::SUCCESS)
}
