use std::path::{Path, PathBuf};

use crate::config::MonitorConfig;
use crate::error::DownloadError;
use crate::request::{LoginMode, ValidatedRequest};

/// Builds the steamcmd argument vector for one job.
///
/// Every user-supplied value is passed as a discrete token to
/// `std::process::Command`; no shell ever interprets the command line, so
/// metacharacters in the app id or credentials cannot alter it.
pub fn build_steamcmd_args(request: &ValidatedRequest, install_dir: &Path) -> Vec<String> {
    let mut args = Vec::new();

    match request.login() {
        LoginMode::Anonymous => {
            args.push("+login".to_string());
            args.push("anonymous".to_string());
        }
        LoginMode::Credentials { username, password } => {
            args.push("+login".to_string());
            args.push(username.clone());
            args.push(password.clone());
        }
    }

    args.push("+force_install_dir".to_string());
    args.push(install_dir.to_string_lossy().to_string());
    args.push("+app_update".to_string());
    args.push(request.app_id().to_string());
    args.push("validate".to_string());
    args.push("+quit".to_string());

    args
}

/// Copy of the argument vector safe to log: the password token after
/// `+login <user>` is masked.
pub fn redact_login_args(args: &[String]) -> Vec<String> {
    let mut redacted = args.to_vec();
    for i in 0..redacted.len() {
        if redacted[i] == "+login" && redacted.get(i + 1).map(String::as_str) != Some("anonymous") {
            if let Some(password) = redacted.get_mut(i + 2) {
                if !password.starts_with('+') {
                    *password = "********".to_string();
                }
            }
        }
    }
    redacted
}

/// Resolves the steamcmd binary, verifying it exists and is executable.
pub fn resolve_steamcmd_path(config: &MonitorConfig) -> Result<PathBuf, DownloadError> {
    let path = config.steamcmd_path.clone();

    if !path.exists() {
        return Err(DownloadError::ToolMissing { path });
    }
    if !is_executable(&path) {
        return Err(DownloadError::ToolNotExecutable { path });
    }

    Ok(path)
}

/// Whether steamcmd is present at the configured path.
pub fn check_steamcmd(config: &MonitorConfig) -> bool {
    resolve_steamcmd_path(config).is_ok()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(windows)]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
