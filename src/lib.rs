//! Supervisor for steamcmd downloads: validates a request, spawns steamcmd
//! with an argument vector, tails its log file on a fixed interval,
//! classifies the output into progress or terminal errors, and publishes
//! links to the downloaded files when the child exits cleanly.

pub mod classify;
pub mod config;
pub mod error;
pub mod jobs;
pub mod links;
pub mod logger;
pub mod monitor;
pub mod preflight;
pub mod request;
pub mod runner;
pub mod snapshot;
pub mod steam_api;
pub mod steamcmd;

pub use classify::{classify as classify_log, LogSignal, TerminalError};
pub use config::MonitorConfig;
pub use error::{DownloadError, ValidationError};
pub use monitor::{CancelToken, ProgressMonitor};
pub use request::{extract_app_id, DownloadRequest, LoginMode, ValidatedRequest};
pub use runner::{DownloadEvent, DownloadRunner};
pub use snapshot::{DownloadStatus, ProgressSnapshot};
