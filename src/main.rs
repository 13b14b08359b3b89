use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;

use steamgrab::{
    logger, steamcmd, DownloadEvent, DownloadRequest, DownloadRunner, DownloadStatus,
    MonitorConfig,
};

/// Download a Steam app with steamcmd and follow its progress.
#[derive(Parser)]
#[command(name = "steamgrab")]
#[command(about = "Download a Steam app with steamcmd and follow its progress")]
#[command(version)]
struct Cli {
    /// App id or Steam store URL
    game: String,

    /// Log in anonymously (free games)
    #[arg(long, conflicts_with_all = ["username", "password"])]
    anonymous: bool,

    /// Steam account name
    #[arg(short, long, requires = "password")]
    username: Option<String>,

    /// Steam account password
    #[arg(short, long, requires = "username")]
    password: Option<String>,

    /// Override the steamcmd path
    #[arg(long)]
    steamcmd: Option<PathBuf>,

    /// Override the downloads root
    #[arg(long = "downloads-dir")]
    downloads_dir: Option<PathBuf>,

    /// Override the public base URL used in file links
    #[arg(long = "public-url")]
    public_url: Option<String>,

    /// Seconds between log polls
    #[arg(long = "poll-interval", default_value_t = 1)]
    poll_interval: u64,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> MonitorConfig {
        let mut config = MonitorConfig::from_env();
        if let Some(path) = &self.steamcmd {
            config.steamcmd_path = path.clone();
        }
        if let Some(dir) = &self.downloads_dir {
            config.downloads_dir = dir.clone();
        }
        if let Some(url) = &self.public_url {
            config.public_base_url = url.clone();
        }
        config.poll_interval = Duration::from_secs(self.poll_interval.max(1));
        config
    }

    fn request(&self) -> DownloadRequest {
        DownloadRequest {
            game: self.game.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            anonymous: self.anonymous,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.config();

    if let Err(err) = logger::init(&config.logs_dir, cli.verbose) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    if !steamcmd::check_steamcmd(&config) {
        eprintln!(
            "steamcmd not found at {}; install it or pass --steamcmd",
            config.steamcmd_path.display()
        );
        return ExitCode::FAILURE;
    }

    let runner = DownloadRunner::new(config);
    let (sender, receiver) = mpsc::channel();

    let job_id = match runner.start(&cli.request(), sender) {
        Ok(job_id) => job_id,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    println!("job {job_id} started");

    let mut final_status = None;
    for event in receiver {
        match event {
            DownloadEvent::Started { game_name, app_id, .. } => {
                println!("downloading {game_name} (app {app_id})");
            }
            DownloadEvent::Snapshot { snapshot, .. } => {
                match snapshot.percent {
                    Some(percent) => println!(
                        "[{:7.1}s] {:6.2}% {}",
                        snapshot.elapsed_seconds, percent, snapshot.message
                    ),
                    None => println!(
                        "[{:7.1}s]         {}",
                        snapshot.elapsed_seconds, snapshot.message
                    ),
                }
                if snapshot.status.is_terminal() {
                    for link in &snapshot.links {
                        println!("  {link}");
                    }
                    final_status = Some(snapshot.status);
                }
            }
            DownloadEvent::Cancelled { job_id } => {
                println!("job {job_id} cancelled");
                return ExitCode::FAILURE;
            }
        }
    }

    match final_status {
        Some(DownloadStatus::Completed) => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_anonymous_invocation() {
        let cli = Cli::parse_from(["steamgrab", "570", "--anonymous"]);
        assert!(cli.anonymous);
        assert_eq!(cli.game, "570");
        assert_eq!(cli.poll_interval, 1);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "steamgrab",
            "https://store.steampowered.com/app/570/Dota_2/",
            "--anonymous",
            "--downloads-dir",
            "/tmp/dl",
            "--public-url",
            "https://example.test",
            "--poll-interval",
            "2",
        ]);
        let config = cli.config();
        assert_eq!(config.downloads_dir, PathBuf::from("/tmp/dl"));
        assert_eq!(config.public_base(), "https://example.test");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
    }
}
