use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::ValidationError;

/// A download request as received from the outside, not yet validated.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    /// App id, either a bare numeric string or a Steam store URL.
    pub game: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
}

/// Login mode carried by a validated request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginMode {
    Anonymous,
    Credentials { username: String, password: String },
}

/// A request that passed validation: the app id is numeric and the login mode
/// is complete. Constructed only through [`DownloadRequest::validate`].
#[derive(Clone, Debug)]
pub struct ValidatedRequest {
    app_id: String,
    login: LoginMode,
}

/// Extracts a numeric app id from a bare id or a Steam store URL.
///
/// `570` stays `570`; `https://store.steampowered.com/app/570/Dota_2/` yields
/// `570`; anything else yields `None`.
pub fn extract_app_id(input: &str) -> Option<String> {
    static STORE_URL_RE: OnceLock<Regex> = OnceLock::new();
    let store_url = STORE_URL_RE
        .get_or_init(|| Regex::new(r"store\.steampowered\.com/app/(\d+)").unwrap());

    let input = input.trim();
    if input.starts_with("http") {
        return store_url
            .captures(input)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
    }

    if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        Some(input.to_string())
    } else {
        None
    }
}

impl DownloadRequest {
    /// One-shot validation. Fails before anything is spawned when the app id
    /// cannot be resolved, or when a non-anonymous request is missing either
    /// credential.
    pub fn validate(&self) -> Result<ValidatedRequest, ValidationError> {
        let app_id = extract_app_id(&self.game).ok_or(ValidationError::InvalidGameId)?;

        let login = if self.anonymous {
            LoginMode::Anonymous
        } else {
            let username = self.username.as_deref().unwrap_or("").trim();
            let password = self.password.as_deref().unwrap_or("");
            if username.is_empty() || password.is_empty() {
                return Err(ValidationError::MissingCredentials);
            }
            LoginMode::Credentials {
                username: username.to_string(),
                password: password.to_string(),
            }
        };

        Ok(ValidatedRequest {
            app_id,
            login,
        })
    }
}

impl ValidatedRequest {
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn login(&self) -> &LoginMode {
        &self.login
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bare_numeric_id() {
        assert_eq!(extract_app_id("570"), Some("570".to_string()));
        assert_eq!(extract_app_id("2379781"), Some("2379781".to_string()));
    }

    #[test]
    fn test_extract_from_store_url() {
        assert_eq!(
            extract_app_id("https://store.steampowered.com/app/570/Dota_2/"),
            Some("570".to_string())
        );
        assert_eq!(
            extract_app_id("http://store.steampowered.com/app/440"),
            Some("440".to_string())
        );
    }

    #[test]
    fn test_extract_rejects_everything_else() {
        assert_eq!(extract_app_id(""), None);
        assert_eq!(extract_app_id("dota 2"), None);
        assert_eq!(extract_app_id("570abc"), None);
        assert_eq!(extract_app_id("https://example.com/app/570"), None);
    }

    #[test]
    fn test_validate_anonymous() {
        let request = DownloadRequest {
            game: "570".to_string(),
            anonymous: true,
            ..DownloadRequest::default()
        };
        let validated = request.validate().unwrap();
        assert_eq!(validated.app_id(), "570");
        assert_eq!(*validated.login(), LoginMode::Anonymous);
    }

    #[test]
    fn test_validate_rejects_missing_id() {
        let request = DownloadRequest {
            game: "not-a-game".to_string(),
            anonymous: true,
            ..DownloadRequest::default()
        };
        assert_eq!(request.validate().unwrap_err(), ValidationError::InvalidGameId);
    }

    #[test]
    fn test_validate_requires_both_credentials() {
        let request = DownloadRequest {
            game: "570".to_string(),
            username: Some("gaben".to_string()),
            password: None,
            anonymous: false,
        };
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::MissingCredentials
        );

        let request = DownloadRequest {
            game: "570".to_string(),
            username: None,
            password: Some("hunter2".to_string()),
            anonymous: false,
        };
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::MissingCredentials
        );
    }

    #[test]
    fn test_validate_with_credentials() {
        let request = DownloadRequest {
            game: "https://store.steampowered.com/app/570/Dota_2/".to_string(),
            username: Some("gaben".to_string()),
            password: Some("hunter2".to_string()),
            anonymous: false,
        };
        let validated = request.validate().unwrap();
        assert_eq!(validated.app_id(), "570");
        assert_eq!(
            *validated.login(),
            LoginMode::Credentials {
                username: "gaben".to_string(),
                password: "hunter2".to_string(),
            }
        );
    }
}
