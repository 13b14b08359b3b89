use serde::Serialize;

use crate::classify::TerminalError;

/// Lifecycle state of one download. Terminal states have no outgoing
/// transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DownloadStatus {
    /// Child alive, no percentage seen yet.
    Running,
    /// Child alive, at least one percentage extracted.
    Downloading,
    Completed,
    AuthError,
    InvalidAppId,
    DiskError,
    GenericError,
}

impl DownloadStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running | Self::Downloading)
    }
}

impl From<&TerminalError> for DownloadStatus {
    fn from(error: &TerminalError) -> Self {
        match error {
            TerminalError::Auth => Self::AuthError,
            TerminalError::InvalidAppId => Self::InvalidAppId,
            TerminalError::DiskSpace => Self::DiskError,
            TerminalError::Generic(_) => Self::GenericError,
        }
    }
}

/// One observation of a running download. Immutable once emitted.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Last extracted percentage, `None` until the first one is seen.
    pub percent: Option<f32>,
    pub elapsed_seconds: f64,
    pub status: DownloadStatus,
    pub message: String,
    /// Public links to the downloaded files; populated only on the final
    /// Completed snapshot.
    pub links: Vec<String>,
}

impl ProgressSnapshot {
    pub(crate) fn running(percent: Option<f32>, elapsed_seconds: f64) -> Self {
        let status = if percent.is_some() {
            DownloadStatus::Downloading
        } else {
            DownloadStatus::Running
        };
        let message = match status {
            DownloadStatus::Downloading => "Downloading...".to_string(),
            _ => "Running...".to_string(),
        };
        Self {
            percent,
            elapsed_seconds,
            status,
            message,
            links: Vec::new(),
        }
    }

    pub(crate) fn terminal(error: &TerminalError, elapsed_seconds: f64) -> Self {
        Self {
            percent: None,
            elapsed_seconds,
            status: DownloadStatus::from(error),
            message: error.message(),
            links: Vec::new(),
        }
    }

    pub(crate) fn completed(elapsed_seconds: f64, links: Vec<String>) -> Self {
        let message = if links.is_empty() {
            "No files downloaded".to_string()
        } else {
            "Download completed".to_string()
        };
        Self {
            percent: Some(100.0),
            elapsed_seconds,
            status: DownloadStatus::Completed,
            message,
            links,
        }
    }
}
