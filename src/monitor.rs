use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::classify::{classify, LogSignal, TerminalError};
use crate::config::MonitorConfig;
use crate::error::DownloadError;
use crate::jobs::{create_job_dirs, job_log_path};
use crate::links::{build_public_links, collect_files};
use crate::request::ValidatedRequest;
use crate::snapshot::ProgressSnapshot;
use crate::steamcmd::{build_steamcmd_args, redact_login_args, resolve_steamcmd_path};

/// Shared flag that terminates a running monitor from another thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owns the spawned steamcmd process for the duration of one request.
/// The child is reaped on normal exit and killed on drop otherwise.
struct ChildProcessHandle {
    child: Child,
    reaped: bool,
}

impl ChildProcessHandle {
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait();
        if let Ok(Some(_)) = status {
            self.reaped = true;
        }
        status
    }

    fn kill_and_reap(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
            self.reaped = true;
        }
    }
}

impl Drop for ChildProcessHandle {
    fn drop(&mut self) {
        self.kill_and_reap();
    }
}

/// Supervises one steamcmd download: spawns the child with stdout and stderr
/// redirected into a per-job log file, then yields one [`ProgressSnapshot`]
/// per poll until the child exits or a terminal error is classified.
///
/// The sequence is lazy, finite and non-restartable; iterate it to drive the
/// download.
pub struct ProgressMonitor {
    config: MonitorConfig,
    job_id: String,
    install_dir: PathBuf,
    handle: ChildProcessHandle,
    /// Read handle on the log; its cursor is the read offset, so each poll
    /// only consumes bytes appended since the previous one.
    log_reader: File,
    /// Partial line carried across polls; the child can flush mid-line.
    pending: Vec<u8>,
    last_percent: Option<f32>,
    started: Instant,
    cancel: CancelToken,
    finished: bool,
}

impl ProgressMonitor {
    /// Validates nothing further; spawns steamcmd for an already-validated
    /// request. The job's install directory and log file are created here,
    /// with the log truncated at start.
    pub fn spawn(
        config: &MonitorConfig,
        request: &ValidatedRequest,
        job_id: &str,
    ) -> Result<Self, DownloadError> {
        let steamcmd = resolve_steamcmd_path(config)?;
        let install_dir = create_job_dirs(config, job_id)?;
        // steamcmd resolves +force_install_dir against its own cwd; hand it
        // an absolute path.
        let install_dir = install_dir.canonicalize().unwrap_or(install_dir);

        let log_path = job_log_path(config, job_id);
        let log_stdout = File::create(&log_path)?;
        let log_stderr = log_stdout.try_clone()?;

        let args = build_steamcmd_args(request, &install_dir);
        log::info!(
            "job {job_id}: spawning {} {}",
            steamcmd.display(),
            redact_login_args(&args).join(" ")
        );

        let child = Command::new(&steamcmd)
            .args(&args)
            .stdout(Stdio::from(log_stdout))
            .stderr(Stdio::from(log_stderr))
            .stdin(Stdio::null())
            .spawn()
            .map_err(DownloadError::Spawn)?;

        let log_reader = File::open(&log_path)?;

        Ok(Self {
            config: config.clone(),
            job_id: job_id.to_string(),
            install_dir,
            handle: ChildProcessHandle {
                child,
                reaped: false,
            },
            log_reader,
            pending: Vec::new(),
            last_percent: None,
            started: Instant::now(),
            cancel: CancelToken::default(),
            finished: false,
        })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn install_dir(&self) -> &std::path::Path {
        &self.install_dir
    }

    /// Token that ends this monitor from another thread; the child is killed
    /// and the snapshot sequence stops without a terminal snapshot.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn elapsed_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Reads bytes appended to the log since the last poll and returns the
    /// complete lines among them; a trailing partial line is carried over.
    fn read_new_lines(&mut self) -> String {
        let mut buffer = Vec::new();
        if self.log_reader.read_to_end(&mut buffer).is_err() {
            return String::new();
        }
        self.pending.extend_from_slice(&buffer);

        let mut lines = String::new();
        while let Some(pos) = self.pending.iter().position(|&byte| byte == b'\n') {
            let mut line_bytes: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(b'\n') = line_bytes.last() {
                line_bytes.pop();
            }
            if let Some(b'\r') = line_bytes.last() {
                line_bytes.pop();
            }
            if !lines.is_empty() {
                lines.push('\n');
            }
            lines.push_str(&String::from_utf8_lossy(&line_bytes));
        }
        lines
    }

    /// Drains the log completely, including a final unterminated line.
    fn read_remaining(&mut self) -> String {
        let mut text = self.read_new_lines();
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&String::from_utf8_lossy(&tail));
        }
        text
    }

    fn terminal_snapshot(&mut self, error: &TerminalError) -> ProgressSnapshot {
        log::warn!("job {}: terminal error: {}", self.job_id, error.message());
        self.handle.kill_and_reap();
        self.finished = true;
        ProgressSnapshot::terminal(error, self.elapsed_seconds())
    }

    /// Final snapshot after a normal exit: any terminal phrase in the
    /// remaining output still wins; otherwise the downloaded files are
    /// enumerated and published.
    fn completion_snapshot(&mut self) -> ProgressSnapshot {
        self.finished = true;

        if let LogSignal::Terminal(error) = classify(&self.read_remaining()) {
            log::warn!(
                "job {}: terminal error at exit: {}",
                self.job_id,
                error.message()
            );
            return ProgressSnapshot::terminal(&error, self.elapsed_seconds());
        }

        let files = collect_files(&self.install_dir).unwrap_or_default();
        let links = build_public_links(&self.config, &self.job_id, &files);
        log::info!(
            "job {}: completed with {} files",
            self.job_id,
            files.len()
        );
        ProgressSnapshot::completed(self.elapsed_seconds(), links)
    }
}

impl Iterator for ProgressMonitor {
    type Item = ProgressSnapshot;

    fn next(&mut self) -> Option<ProgressSnapshot> {
        if self.finished {
            return None;
        }

        if self.cancel.is_cancelled() {
            log::info!("job {}: cancelled", self.job_id);
            self.handle.kill_and_reap();
            self.finished = true;
            return None;
        }

        match self.handle.try_wait() {
            Ok(Some(_status)) => Some(self.completion_snapshot()),
            Ok(None) => {
                thread::sleep(self.config.poll_interval);

                let text = self.read_new_lines();
                match classify(&text) {
                    LogSignal::Terminal(error) => Some(self.terminal_snapshot(&error)),
                    LogSignal::Progress(percent) => {
                        self.last_percent = Some(percent);
                        Some(ProgressSnapshot::running(
                            self.last_percent,
                            self.elapsed_seconds(),
                        ))
                    }
                    LogSignal::NoSignal => Some(ProgressSnapshot::running(
                        self.last_percent,
                        self.elapsed_seconds(),
                    )),
                }
            }
            Err(err) => {
                let error = TerminalError::Generic(format!("Failed to wait on steamcmd: {err}"));
                Some(self.terminal_snapshot(&error))
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::request::DownloadRequest;
    use crate::snapshot::DownloadStatus;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Writes a fake steamcmd shell script. The install dir arrives as the
    /// fourth argument (after `+login anonymous +force_install_dir`).
    fn fake_steamcmd(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("steamcmd.sh");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\nINSTALL_DIR=\"$4\"\n{body}").unwrap();
        let mut perms = file.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn test_config(root: &Path, script: PathBuf) -> MonitorConfig {
        MonitorConfig {
            steamcmd_path: script,
            downloads_dir: root.join("downloads"),
            logs_dir: root.join("logs"),
            poll_interval: Duration::from_millis(50),
            ..MonitorConfig::default()
        }
    }

    fn anonymous_request() -> ValidatedRequest {
        DownloadRequest {
            game: "570".to_string(),
            anonymous: true,
            ..DownloadRequest::default()
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn test_completed_download_lists_files() {
        let root = tempdir().unwrap();
        let script = fake_steamcmd(
            root.path(),
            r#"echo "Update state (0x61) downloading, progress: 35.93 (1 / 2)"
mkdir -p "$INSTALL_DIR/data"
echo content > "$INSTALL_DIR/game.bin"
echo content > "$INSTALL_DIR/data/pak0.vpk"
echo "Progress: 100.00%""#,
        );
        let config = test_config(root.path(), script);

        let monitor = ProgressMonitor::spawn(&config, &anonymous_request(), "job-ok").unwrap();
        let snapshots: Vec<ProgressSnapshot> = monitor.collect();

        let last = snapshots.last().unwrap();
        assert_eq!(last.status, DownloadStatus::Completed);
        assert_eq!(last.percent, Some(100.0));
        assert_eq!(last.links.len(), 2);
        for link in &last.links {
            assert!(link.starts_with("http://0.0.0.0:7860/downloads/job-ok/"));
        }
    }

    #[test]
    fn test_disk_error_kills_child_and_ends_sequence() {
        let root = tempdir().unwrap();
        let script = fake_steamcmd(
            root.path(),
            r#"echo "ERROR: No space left on device"
sleep 30"#,
        );
        let config = test_config(root.path(), script);

        let started = Instant::now();
        let monitor = ProgressMonitor::spawn(&config, &anonymous_request(), "job-disk").unwrap();
        let snapshots: Vec<ProgressSnapshot> = monitor.collect();

        let last = snapshots.last().unwrap();
        assert_eq!(last.status, DownloadStatus::DiskError);
        assert_eq!(last.message, "No space left on device");
        // The 30s sleep was cut short by the kill.
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_auth_error_is_terminal() {
        let root = tempdir().unwrap();
        let script = fake_steamcmd(
            root.path(),
            r#"echo "FAILED (Login Failure)"
sleep 30"#,
        );
        let config = test_config(root.path(), script);

        let monitor = ProgressMonitor::spawn(&config, &anonymous_request(), "job-auth").unwrap();
        let last = monitor.last().unwrap();
        assert_eq!(last.status, DownloadStatus::AuthError);
        assert_eq!(last.message, "Authentication failed");
    }

    #[test]
    fn test_progress_then_completion() {
        let root = tempdir().unwrap();
        let script = fake_steamcmd(
            root.path(),
            r#"echo "Update state (0x61) downloading, progress: 12.50 (1 / 8)"
sleep 0.2
echo "Update state (0x61) downloading, progress: 87.50 (7 / 8)"
sleep 0.2"#,
        );
        let config = test_config(root.path(), script);

        let monitor = ProgressMonitor::spawn(&config, &anonymous_request(), "job-prog").unwrap();
        let snapshots: Vec<ProgressSnapshot> = monitor.collect();

        assert!(snapshots
            .iter()
            .any(|s| s.status == DownloadStatus::Downloading && s.percent.is_some()));
        assert_eq!(
            snapshots.last().unwrap().status,
            DownloadStatus::Completed
        );
    }

    #[test]
    fn test_cancel_ends_sequence_without_terminal_snapshot() {
        let root = tempdir().unwrap();
        let script = fake_steamcmd(root.path(), "sleep 30");
        let config = test_config(root.path(), script);

        let mut monitor =
            ProgressMonitor::spawn(&config, &anonymous_request(), "job-cancel").unwrap();
        let token = monitor.cancel_token();

        let first = monitor.next().unwrap();
        assert_eq!(first.status, DownloadStatus::Running);

        token.cancel();
        assert!(monitor.next().is_none());
    }

    #[test]
    fn test_spawn_failure_is_distinct() {
        let root = tempdir().unwrap();
        let config = test_config(root.path(), root.path().join("missing-steamcmd.sh"));
        let err = ProgressMonitor::spawn(&config, &anonymous_request(), "job-missing")
            .err()
            .expect("spawn should fail without the tool");
        assert!(matches!(err, DownloadError::ToolMissing { .. }));
    }
}
