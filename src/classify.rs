use std::sync::OnceLock;

use regex::Regex;

/// Terminal conditions recognized in steamcmd output. Any of these aborts the
/// poll loop and kills the child.
#[derive(Clone, Debug, PartialEq)]
pub enum TerminalError {
    /// "Login Failure" — bad or rejected credentials.
    Auth,
    /// The app id was not accepted by Steam.
    InvalidAppId,
    /// The target disk filled up mid-download.
    DiskSpace,
    /// Any other "ERROR" marker, with the trailing message when one is present.
    Generic(String),
}

impl TerminalError {
    /// User-facing message, the sole error text surfaced downstream.
    pub fn message(&self) -> String {
        match self {
            Self::Auth => "Authentication failed".to_string(),
            Self::InvalidAppId => "Invalid game ID".to_string(),
            Self::DiskSpace => "No space left on device".to_string(),
            Self::Generic(message) => message.clone(),
        }
    }
}

/// Result of classifying a chunk of log text.
#[derive(Clone, Debug, PartialEq)]
pub enum LogSignal {
    /// A progress percentage was extracted.
    Progress(f32),
    /// A terminal error phrase was found.
    Terminal(TerminalError),
    /// Nothing recognizable; the previous state stands.
    NoSignal,
}

const AUTH_FAILURE_PHRASE: &str = "Login Failure";
const DISK_FULL_PHRASES: &[&str] = &["No space left on device", "not enough free disk space"];

/// Classifies steamcmd log text.
///
/// Precedence is fixed and first-match-wins: auth failure, then invalid app
/// id, then disk full, then any other ERROR marker, then progress extraction.
/// A chunk carrying both an error phrase and a percentage always classifies
/// as the error. Classification is pure; the same text yields the same
/// signal on every call.
pub fn classify(text: &str) -> LogSignal {
    static INVALID_APP_RE: OnceLock<Regex> = OnceLock::new();
    let invalid_app =
        INVALID_APP_RE.get_or_init(|| Regex::new(r"Invalid App ?ID").unwrap());

    if text.contains(AUTH_FAILURE_PHRASE) {
        return LogSignal::Terminal(TerminalError::Auth);
    }
    if invalid_app.is_match(text) {
        return LogSignal::Terminal(TerminalError::InvalidAppId);
    }
    if DISK_FULL_PHRASES
        .iter()
        .any(|phrase| text.to_lowercase().contains(&phrase.to_lowercase()))
    {
        return LogSignal::Terminal(TerminalError::DiskSpace);
    }
    if text.contains("ERROR") {
        return LogSignal::Terminal(TerminalError::Generic(extract_error_message(text)));
    }

    match extract_percent(text) {
        Some(percent) => LogSignal::Progress(percent),
        None => LogSignal::NoSignal,
    }
}

/// Extracts a progress percentage, trying patterns in fixed order and
/// returning the first numeric match of the first pattern that matches.
pub fn extract_percent(text: &str) -> Option<f32> {
    static PERCENT_RES: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PERCENT_RES.get_or_init(|| {
        [
            // steamcmd's own status line:
            // "Update state (0x61) downloading, progress: 42.81 (1234 / 2883)"
            r"Update state \(0x[0-9a-fA-F]+\) \w+, progress: (\d+\.\d+)",
            r"Progress: (\d+\.\d+)%",
            r"(\d+\.\d+)%",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).unwrap())
        .collect()
    });

    for pattern in patterns {
        if let Some(caps) = pattern.captures(text) {
            if let Ok(percent) = caps[1].parse::<f32>() {
                return Some(percent.clamp(0.0, 100.0));
            }
        }
    }
    None
}

/// Pulls the text after an ERROR marker, falling back to a generic message
/// when the marker stands alone.
fn extract_error_message(text: &str) -> String {
    static ERROR_TAIL_RE: OnceLock<Regex> = OnceLock::new();
    let error_tail =
        ERROR_TAIL_RE.get_or_init(|| Regex::new(r"ERROR!?\s*[:!\-]?\s*(\S[^\r\n]*)").unwrap());

    error_tail
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| "Download error occurred".to_string())
}
