use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::config::MonitorConfig;
use crate::error::DownloadError;

/// Generates a unique job id: `<UTC timestamp>-<short unique suffix>`.
/// Example: `20260830-114502-k3f9x1`
pub fn generate_job_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    format!("{}-{}", timestamp, generate_short_id())
}

/// Six base36 characters derived from the clock and the process id.
fn generate_short_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mut seed = nanos ^ u128::from(std::process::id());

    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut id = String::with_capacity(6);
    for _ in 0..6 {
        id.push(ALPHABET[(seed % 36) as usize] as char);
        seed /= 36;
    }
    id
}

/// Install directory for a job: `{downloads_dir}/{job_id}/`.
pub fn job_install_dir(config: &MonitorConfig, job_id: &str) -> PathBuf {
    config.downloads_dir.join(job_id)
}

/// Log file for a job: `{logs_dir}/{job_id}.log`.
pub fn job_log_path(config: &MonitorConfig, job_id: &str) -> PathBuf {
    config.logs_dir.join(format!("{job_id}.log"))
}

/// Creates the per-job install directory, refusing to reuse an existing one,
/// and makes sure the logs directory exists.
pub fn create_job_dirs(config: &MonitorConfig, job_id: &str) -> Result<PathBuf, DownloadError> {
    ensure_writable_dir(&config.downloads_dir)?;
    fs::create_dir_all(&config.logs_dir)?;

    let install_dir = job_install_dir(config, job_id);
    if install_dir.exists() {
        return Err(DownloadError::JobDirExists {
            job_id: job_id.to_string(),
            path: install_dir,
        });
    }
    fs::create_dir_all(&install_dir)?;
    Ok(install_dir)
}

/// Removes a job's install directory (failed or cancelled jobs only; completed
/// jobs keep their files as the served artifacts).
pub fn cleanup_job_dir(config: &MonitorConfig, job_id: &str) -> Result<(), DownloadError> {
    let install_dir = job_install_dir(config, job_id);
    if !install_dir.exists() {
        return Ok(());
    }
    fs::remove_dir_all(&install_dir)?;
    log::info!("removed install directory for job {job_id}");
    Ok(())
}

/// Creates the directory if needed and probes it with a throwaway write.
fn ensure_writable_dir(path: &Path) -> Result<(), DownloadError> {
    fs::create_dir_all(path)?;

    let probe = path.join(".write_test");
    let write_result = OpenOptions::new().write(true).create(true).open(&probe);
    match write_result {
        Ok(mut file) => {
            let _ = file.flush();
            let _ = fs::remove_file(&probe);
            Ok(())
        }
        Err(_) => Err(DownloadError::DownloadsDirNotWritable {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_in(root: &Path) -> MonitorConfig {
        MonitorConfig {
            downloads_dir: root.join("downloads"),
            logs_dir: root.join("logs"),
            ..MonitorConfig::default()
        }
    }

    #[test]
    fn test_job_id_format() {
        let job_id = generate_job_id();
        let parts: Vec<&str> = job_id.split('-').collect();
        assert_eq!(parts.len(), 3, "timestamp date, time and suffix");
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 6);
    }

    #[test]
    fn test_job_ids_are_unique() {
        let first = generate_job_id();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let second = generate_job_id();
        assert_ne!(first, second);
    }

    #[test]
    fn test_create_and_cleanup_job_dirs() {
        let root = tempdir().unwrap();
        let config = config_in(root.path());

        let install_dir = create_job_dirs(&config, "job-a").unwrap();
        assert!(install_dir.is_dir());
        assert!(config.logs_dir.is_dir());

        // Same id again must be rejected.
        assert!(matches!(
            create_job_dirs(&config, "job-a"),
            Err(DownloadError::JobDirExists { .. })
        ));

        cleanup_job_dir(&config, "job-a").unwrap();
        assert!(!install_dir.exists());
        // Cleaning up a missing dir is fine.
        cleanup_job_dir(&config, "job-a").unwrap();
    }

    #[test]
    fn test_paths_are_per_job() {
        let root = tempdir().unwrap();
        let config = config_in(root.path());
        assert_ne!(
            job_install_dir(&config, "a"),
            job_install_dir(&config, "b")
        );
        assert_ne!(job_log_path(&config, "a"), job_log_path(&config, "b"));
    }
}
