use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;

use serde::Serialize;

use crate::config::MonitorConfig;
use crate::error::DownloadError;
use crate::jobs::{cleanup_job_dir, generate_job_id};
use crate::monitor::{CancelToken, ProgressMonitor};
use crate::preflight::check_free_space;
use crate::request::DownloadRequest;
use crate::snapshot::{DownloadStatus, ProgressSnapshot};
use crate::steam_api::resolve_game_name;

/// Events emitted over the runner's channel, each tagged with the job they
/// belong to.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DownloadEvent {
    #[serde(rename_all = "camelCase")]
    Started {
        job_id: String,
        app_id: String,
        game_name: String,
    },
    #[serde(rename_all = "camelCase")]
    Snapshot {
        job_id: String,
        snapshot: ProgressSnapshot,
    },
    #[serde(rename_all = "camelCase")]
    Cancelled { job_id: String },
}

/// State of the one download a runner allows at a time.
#[derive(Default)]
struct ActiveDownload {
    job_id: Option<String>,
    cancel: Option<CancelToken>,
}

/// Single-flight download supervisor.
///
/// One runner runs at most one job at a time; a second `start` while a job is
/// active fails with [`DownloadError::AlreadyRunning`]. Each job gets its own
/// install directory and log file, so a fresh runner with the same config
/// never collides with artifacts of earlier jobs.
#[derive(Clone)]
pub struct DownloadRunner {
    config: MonitorConfig,
    inner: Arc<Mutex<ActiveDownload>>,
}

impl DownloadRunner {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(ActiveDownload::default())),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Validates the request, runs the disk preflight, spawns steamcmd and a
    /// worker thread that forwards every snapshot over `sender`. Returns the
    /// job id immediately.
    pub fn start(
        &self,
        request: &DownloadRequest,
        sender: Sender<DownloadEvent>,
    ) -> Result<String, DownloadError> {
        let validated = request.validate()?;
        check_free_space(&self.config)?;

        let job_id = {
            let mut guard = self.inner.lock().map_err(|_| DownloadError::StatePoisoned)?;
            if let Some(active) = &guard.job_id {
                return Err(DownloadError::AlreadyRunning(active.clone()));
            }
            let job_id = generate_job_id();
            guard.job_id = Some(job_id.clone());
            guard.cancel = None;
            job_id
        };

        let monitor = match ProgressMonitor::spawn(&self.config, &validated, &job_id) {
            Ok(monitor) => monitor,
            Err(err) => {
                self.clear(&job_id);
                let _ = cleanup_job_dir(&self.config, &job_id);
                return Err(err);
            }
        };

        let token = monitor.cancel_token();
        if let Ok(mut guard) = self.inner.lock() {
            guard.cancel = Some(token.clone());
        }

        let runner = self.clone();
        let app_id = validated.app_id().to_string();
        let worker_job_id = job_id.clone();
        thread::spawn(move || {
            runner.run_worker(monitor, token, sender, &worker_job_id, &app_id);
        });

        Ok(job_id)
    }

    /// Terminates the active job, if any. The worker notices the tripped
    /// token, kills the child and emits a `Cancelled` event.
    pub fn cancel(&self) -> Result<(), DownloadError> {
        let guard = self.inner.lock().map_err(|_| DownloadError::StatePoisoned)?;
        let token = guard.cancel.as_ref().ok_or(DownloadError::NotRunning)?;
        token.cancel();
        Ok(())
    }

    fn run_worker(
        &self,
        monitor: ProgressMonitor,
        token: CancelToken,
        sender: Sender<DownloadEvent>,
        job_id: &str,
        app_id: &str,
    ) {
        let game_name = resolve_game_name(app_id);
        log::info!("job {job_id}: downloading {game_name} (app {app_id})");
        let _ = sender.send(DownloadEvent::Started {
            job_id: job_id.to_string(),
            app_id: app_id.to_string(),
            game_name,
        });

        let mut failed = false;
        for snapshot in monitor {
            if snapshot.status.is_terminal() && snapshot.status != DownloadStatus::Completed {
                failed = true;
            }
            let _ = sender.send(DownloadEvent::Snapshot {
                job_id: job_id.to_string(),
                snapshot,
            });
        }

        if token.is_cancelled() {
            if let Err(err) = cleanup_job_dir(&self.config, job_id) {
                log::warn!("job {job_id}: cleanup after cancel failed: {err}");
            }
            self.clear(job_id);
            let _ = sender.send(DownloadEvent::Cancelled {
                job_id: job_id.to_string(),
            });
        } else {
            if failed {
                // Failed jobs do not keep partial downloads around.
                if let Err(err) = cleanup_job_dir(&self.config, job_id) {
                    log::warn!("job {job_id}: cleanup after failure failed: {err}");
                }
            }
            self.clear(job_id);
        }
    }

    fn clear(&self, job_id: &str) {
        if let Ok(mut guard) = self.inner.lock() {
            if guard.job_id.as_deref() == Some(job_id) {
                guard.job_id = None;
                guard.cancel = None;
            }
        }
    }
}
