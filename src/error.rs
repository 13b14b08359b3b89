use std::path::PathBuf;

use thiserror::Error;

/// Pre-spawn request validation failures. These short-circuit before any
/// process is spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid Game ID or URL")]
    InvalidGameId,
    #[error("Username and password required for non-anonymous login")]
    MissingCredentials,
}

/// Operational failures of the download supervisor.
///
/// Terminal conditions detected from steamcmd's log output (auth failure,
/// invalid app id, disk full, generic tool error) are not errors at this level;
/// they are reported through [`crate::snapshot::ProgressSnapshot`] statuses.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("a download is already running (job {0})")]
    AlreadyRunning(String),

    #[error("no download is running")]
    NotRunning,

    #[error("steamcmd not found at {}", path.display())]
    ToolMissing { path: PathBuf },

    #[error("steamcmd is not executable at {}", path.display())]
    ToolNotExecutable { path: PathBuf },

    #[error("failed to spawn steamcmd: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("not enough free disk space: {available} bytes available, {required} required")]
    DiskSpace { available: u64, required: u64 },

    #[error("Steam API request failed: {0}")]
    SteamApi(String),

    #[error("download directory is not writable: {}", path.display())]
    DownloadsDirNotWritable { path: PathBuf },

    #[error("job {job_id} already has a directory at {}", path.display())]
    JobDirExists { job_id: String, path: PathBuf },

    #[error("runner state lock poisoned")]
    StatePoisoned,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
