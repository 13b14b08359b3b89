use std::path::Path;

use log::LevelFilter;
use log4rs::{
    append::{
        console::ConsoleAppender,
        rolling_file::{
            policy::compound::{
                roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
            },
            RollingFileAppender,
        },
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

use crate::error::DownloadError;

/// Initializes logging: a rolling file under `logs_dir` plus the console.
/// Re-initialization (tests, repeated setup) is a no-op.
pub fn init(logs_dir: &Path, verbose: bool) -> Result<(), DownloadError> {
    std::fs::create_dir_all(logs_dir)?;
    let log_file = logs_dir.join("steamgrab.log");

    // 5MB per file, keep 3 rolled files.
    let roller = FixedWindowRoller::builder()
        .build(
            &logs_dir.join("steamgrab.{}.log").to_string_lossy(),
            3,
        )
        .map_err(|e| log_setup_error(e.to_string()))?;
    let policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(5 * 1024 * 1024)),
        Box::new(roller),
    );

    let file_appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}",
        )))
        .build(&log_file, Box::new(policy))
        .map_err(|e| log_setup_error(e.to_string()))?;

    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("[{l}] {m}{n}")))
        .build();

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(file_appender)))
        .appender(Appender::builder().build("console", Box::new(console)))
        .build(
            Root::builder()
                .appender("file")
                .appender("console")
                .build(level),
        )
        .map_err(|e| log_setup_error(e.to_string()))?;

    // Already initialized: keep the existing logger.
    if log4rs::init_config(config).is_err() {
        return Ok(());
    }

    log::info!("log file: {}", log_file.display());
    Ok(())
}

fn log_setup_error(message: String) -> DownloadError {
    DownloadError::Io(std::io::Error::new(std::io::ErrorKind::Other, message))
}
