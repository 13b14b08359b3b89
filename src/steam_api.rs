use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::DownloadError;

const STEAM_STORE_API_URL: &str = "https://store.steampowered.com/api/appdetails";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Response from Steam's appdetails API, keyed by app id.
#[derive(Debug, Deserialize)]
struct AppDetailsResponse {
    success: bool,
    data: Option<AppData>,
}

#[derive(Debug, Deserialize)]
struct AppData {
    name: String,
    #[serde(default)]
    steam_appid: u64,
}

/// Information fetched from Steam's public store API.
#[derive(Debug, Clone)]
pub struct SteamAppInfo {
    /// Human-readable game name.
    pub name: String,
    /// App id as echoed by the API.
    pub steam_appid: u64,
}

/// Fetches app info from the public store endpoint (no authentication;
/// rate limit ~200 requests per 5 minutes).
pub fn fetch_app_info(app_id: &str) -> Result<SteamAppInfo, DownloadError> {
    let url = format!("{STEAM_STORE_API_URL}?appids={app_id}");

    let client = reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| DownloadError::SteamApi(e.to_string()))?;
    let response = client
        .get(&url)
        .send()
        .map_err(|e| DownloadError::SteamApi(e.to_string()))?;

    if !response.status().is_success() {
        return Err(DownloadError::SteamApi(format!(
            "Steam API returned status {}",
            response.status()
        )));
    }

    let body: HashMap<String, AppDetailsResponse> = response
        .json()
        .map_err(|e| DownloadError::SteamApi(e.to_string()))?;

    let app_response = body
        .get(app_id)
        .ok_or_else(|| DownloadError::SteamApi(format!("no data returned for app {app_id}")))?;

    if !app_response.success {
        return Err(DownloadError::SteamApi(format!(
            "Steam API returned success=false for app {app_id}; it may not exist or be restricted"
        )));
    }

    let data = app_response
        .data
        .as_ref()
        .ok_or_else(|| DownloadError::SteamApi(format!("no app data in response for {app_id}")))?;

    Ok(SteamAppInfo {
        name: data.name.clone(),
        steam_appid: data.steam_appid,
    })
}

/// Game name for logs and events, falling back to `app_{id}` when the store
/// API is unreachable or says no.
pub fn resolve_game_name(app_id: &str) -> String {
    match fetch_app_info(app_id) {
        Ok(info) => info.name,
        Err(err) => {
            log::warn!("could not resolve name for app {app_id}: {err}");
            format!("app_{app_id}")
        }
    }
}
