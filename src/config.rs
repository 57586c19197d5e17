use crate::playback::PlayerSettings;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_WEB_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_PLAYER_NAME: &str = "Synctify Web Player";
const DEFAULT_INITIAL_VOLUME: u8 = 50;
const DEFAULT_SDK_TIMEOUT_SECS: u64 = 20;

/// Application configuration
/// In debug builds: loads a .env file first, then reads the environment
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Backend serving /refresh_token and the notification channel auth
    pub api_base_url: String,
    /// Remote playback Web API (the play endpoint lives under it)
    pub web_api_url: String,
    /// Name the playback device advertises
    pub player_name: String,
    /// Initial device volume, 0–100
    pub initial_volume: u8,
    pub sdk_load_timeout: Duration,
    /// Session file override; defaults to the user config dir
    pub session_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            web_api_url: DEFAULT_WEB_API_URL.to_string(),
            player_name: DEFAULT_PLAYER_NAME.to_string(),
            initial_volume: DEFAULT_INITIAL_VOLUME,
            sdk_load_timeout: Duration::from_secs(DEFAULT_SDK_TIMEOUT_SECS),
            session_path: None,
        }
    }
}

impl Config {
    /// Load configuration based on build mode
    pub fn load() -> Self {
        #[cfg(debug_assertions)]
        {
            if dotenvy::dotenv().is_ok() {
                tracing::info!("Config: dev mode, loaded .env file");
            } else {
                tracing::info!("Config: no .env file found, using environment only");
            }
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from a variable lookup; unset or invalid values
    /// fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let initial_volume = text("SYNCTIFY_INITIAL_VOLUME")
            .and_then(|raw| match raw.trim().parse::<u8>() {
                Ok(volume) => Some(volume.min(100)),
                Err(_) => {
                    warn!("Config: ignoring invalid SYNCTIFY_INITIAL_VOLUME '{}'", raw);
                    None
                }
            })
            .unwrap_or(defaults.initial_volume);

        let sdk_load_timeout = text("SYNCTIFY_SDK_TIMEOUT_SECS")
            .and_then(|raw| match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    warn!("Config: ignoring invalid SYNCTIFY_SDK_TIMEOUT_SECS '{}'", raw);
                    None
                }
            })
            .unwrap_or(defaults.sdk_load_timeout);

        Self {
            api_base_url: text("SYNCTIFY_API_BASE_URL").unwrap_or(defaults.api_base_url),
            web_api_url: text("SYNCTIFY_WEB_API_URL").unwrap_or(defaults.web_api_url),
            player_name: text("SYNCTIFY_PLAYER_NAME").unwrap_or(defaults.player_name),
            initial_volume,
            sdk_load_timeout,
            session_path: text("SYNCTIFY_SESSION_PATH").map(PathBuf::from),
        }
    }

    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            device_name: self.player_name.clone(),
            initial_volume: self.initial_volume,
            sdk_load_timeout: self.sdk_load_timeout,
        }
    }
}
