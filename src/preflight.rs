use std::path::{Path, PathBuf};

use sysinfo::Disks;

use crate::config::MonitorConfig;
use crate::error::DownloadError;

/// Verifies the disk holding the downloads root has at least
/// `config.min_free_bytes` available before a job spawns.
///
/// When no mounted disk matches the path (some containers report none) the
/// check passes; the mid-run DiskError classification still covers a disk
/// filling up later.
pub fn check_free_space(config: &MonitorConfig) -> Result<(), DownloadError> {
    let target = config
        .downloads_dir
        .canonicalize()
        .unwrap_or_else(|_| config.downloads_dir.clone());

    let disks = Disks::new_with_refreshed_list();
    let mounts: Vec<(PathBuf, u64)> = disks
        .list()
        .iter()
        .map(|disk| (disk.mount_point().to_path_buf(), disk.available_space()))
        .collect();

    let Some(available) = available_on_disk(&mounts, &target) else {
        return Ok(());
    };

    if available < config.min_free_bytes {
        return Err(DownloadError::DiskSpace {
            available,
            required: config.min_free_bytes,
        });
    }
    Ok(())
}

/// Picks the available space of the disk whose mount point is the longest
/// prefix of `target`.
fn available_on_disk(mounts: &[(PathBuf, u64)], target: &Path) -> Option<u64> {
    mounts
        .iter()
        .filter(|(mount, _)| target.starts_with(mount))
        .max_by_key(|(mount, _)| mount.as_os_str().len())
        .map(|(_, available)| *available)
}
