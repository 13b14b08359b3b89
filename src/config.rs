use std::path::PathBuf;
use std::time::Duration;

/// Default public base URL, matching the default serving port.
const DEFAULT_PORT: u16 = 7860;

/// Explicit configuration for one supervisor instance.
///
/// Everything the monitor touches on the outside world lives here so that
/// concurrent, isolated instances are possible; there is no module-level
/// mutable state.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Path to the steamcmd entry point.
    pub steamcmd_path: PathBuf,
    /// Root directory that per-job install directories are created under.
    pub downloads_dir: PathBuf,
    /// Directory for per-job steamcmd log files.
    pub logs_dir: PathBuf,
    /// Base URL prepended to `/downloads/<relative path>` when building
    /// public links.
    pub public_base_url: String,
    /// Interval between log polls.
    pub poll_interval: Duration,
    /// Minimum free space required on the downloads disk before a job starts.
    pub min_free_bytes: u64,
    /// Cap on the number of public links in the completion snapshot.
    pub max_links: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            steamcmd_path: default_steamcmd_path(),
            downloads_dir: PathBuf::from("./downloads"),
            logs_dir: PathBuf::from("./logs"),
            public_base_url: format!("http://0.0.0.0:{DEFAULT_PORT}"),
            poll_interval: Duration::from_secs(1),
            min_free_bytes: 1024 * 1024 * 1024,
            max_links: 20,
        }
    }
}

impl MonitorConfig {
    /// Builds a config from the environment, falling back to defaults.
    ///
    /// Recognized variables: `STEAMCMD_PATH`, `DOWNLOADS_DIR`, `LOGS_DIR`,
    /// `PUBLIC_URL`, `PORT` (used for the default public base when
    /// `PUBLIC_URL` is unset).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("STEAMCMD_PATH") {
            config.steamcmd_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("DOWNLOADS_DIR") {
            config.downloads_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("LOGS_DIR") {
            config.logs_dir = PathBuf::from(dir);
        }

        if let Ok(url) = std::env::var("PUBLIC_URL") {
            config.public_base_url = url;
        } else if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.public_base_url = format!("http://0.0.0.0:{port}");
            }
        }

        config
    }

    /// The public base URL without a trailing slash.
    pub fn public_base(&self) -> &str {
        self.public_base_url.trim_end_matches('/')
    }
}

fn default_steamcmd_path() -> PathBuf {
    #[cfg(windows)]
    {
        PathBuf::from("./steamcmd/steamcmd.exe")
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("./steamcmd/steamcmd.sh")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.max_links, 20);
        assert_eq!(config.public_base(), "http://0.0.0.0:7860");
    }

    #[test]
    fn test_public_base_strips_trailing_slash() {
        let config = MonitorConfig {
            public_base_url: "https://example.up.railway.app/".to_string(),
            ..MonitorConfig::default()
        };
        assert_eq!(config.public_base(), "https://example.up.railway.app");
    }
}
