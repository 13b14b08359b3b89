use std::fs;
use std::path::{Path, PathBuf};

use crate::config::MonitorConfig;
use crate::error::DownloadError;

/// Recursively collects every regular file under `dir`, returned as paths
/// relative to `dir`, sorted for stable output.
pub fn collect_files(dir: &Path) -> Result<Vec<PathBuf>, DownloadError> {
    let mut files = Vec::new();
    if dir.exists() {
        walk(dir, dir, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn walk(root: &Path, dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), DownloadError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(root, &path, files)?;
        } else if path.is_file() {
            if let Ok(relative) = path.strip_prefix(root) {
                files.push(relative.to_path_buf());
            }
        }
    }
    Ok(())
}

/// Builds one public link per downloaded file for a job:
/// `{public_base}/downloads/{job_id}/{relative_path}` with forward slashes.
///
/// The list is capped at `config.max_links` entries; when files are dropped a
/// trailing truncation marker says how many.
pub fn build_public_links(
    config: &MonitorConfig,
    job_id: &str,
    files: &[PathBuf],
) -> Vec<String> {
    let base = config.public_base();
    let mut links: Vec<String> = files
        .iter()
        .take(config.max_links)
        .map(|relative| {
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            format!("{base}/downloads/{job_id}/{relative}")
        })
        .collect();

    if files.len() > config.max_links {
        links.push(format!(
            "... and {} more files",
            files.len() - config.max_links
        ));
    }

    links
}
