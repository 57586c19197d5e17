// # Session Store
//
// The signed-in user's tokens, client settings and sync flags. Shared between
// the playback controller (which only reads the access token), the API client
// (which writes refreshed tokens) and the sync-notification handler.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("No configuration directory available")]
    NoConfigDir,
}

/// OAuth client settings entered by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub redirect_uri: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub settings: UserSettings,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expiry: Option<String>,
    pub id: Option<String>,
    /// Whether the private notification channel is subscribed
    pub pusher_authenticated: bool,
    /// Set when a sync finished and the song list should be refetched
    pub fetch_songs_now: bool,
    /// Last completed sync, formatted `dd/mm/yyyy HH:MM`
    pub last_sync: Option<String>,
}

/// Cloneable handle to the session shared across components
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    user: Arc<RwLock<User>>,
}

impl SharedSession {
    pub fn new(user: User) -> Self {
        Self {
            user: Arc::new(RwLock::new(user)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, User> {
        self.user.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, User> {
        self.user.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current access token; empty tokens count as absent
    pub fn access_token(&self) -> Option<String> {
        self.read()
            .access_token
            .clone()
            .filter(|token| !token.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read()
            .refresh_token
            .clone()
            .filter(|token| !token.is_empty())
    }

    pub fn user_id(&self) -> Option<String> {
        self.read().id.clone()
    }

    pub fn settings(&self) -> UserSettings {
        self.read().settings.clone()
    }

    /// Copy of the whole user record
    pub fn snapshot(&self) -> User {
        self.read().clone()
    }

    pub fn set_access_token(&self, token: impl Into<String>) {
        self.write().access_token = Some(token.into());
    }

    /// Apply an arbitrary mutation under the write lock
    pub fn update<R>(&self, f: impl FnOnce(&mut User) -> R) -> R {
        f(&mut self.write())
    }

    /// Clear the fetch flag, returning whether it was set
    pub fn take_fetch_request(&self) -> bool {
        std::mem::take(&mut self.write().fetch_songs_now)
    }

    /// Default location of the persisted session
    pub fn default_path() -> Result<PathBuf, SessionError> {
        dirs::config_dir()
            .map(|dir| dir.join("synctify").join("session.json"))
            .ok_or(SessionError::NoConfigDir)
    }

    /// Load a persisted session; a missing file yields an empty session
    pub fn load_from(path: &Path) -> Result<Self, SessionError> {
        if !path.exists() {
            debug!("No session file at {}, starting signed out", path.display());
            return Ok(Self::default());
        }
        let data = std::fs::read(path)?;
        let user: User = serde_json::from_slice(&data)?;
        info!("Loaded session from {}", path.display());
        Ok(Self::new(user))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SessionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(&self.snapshot())?;
        std::fs::write(path, data)?;
        debug!("Saved session to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_access_token_is_absent() {
        let session = SharedSession::default();
        assert_eq!(session.access_token(), None);

        session.set_access_token("");
        assert_eq!(session.access_token(), None);

        session.set_access_token("abc");
        assert_eq!(session.access_token(), Some("abc".to_string()));
    }

    #[test]
    fn test_clones_share_state() {
        let session = SharedSession::default();
        let other = session.clone();
        other.set_access_token("shared");
        assert_eq!(session.access_token(), Some("shared".to_string()));
    }

    #[test]
    fn test_take_fetch_request() {
        let session = SharedSession::default();
        session.update(|user| user.fetch_songs_now = true);
        assert!(session.take_fetch_request());
        assert!(!session.take_fetch_request());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("session.json");

        let session = SharedSession::new(User {
            access_token: Some("token".to_string()),
            refresh_token: Some("refresh".to_string()),
            id: Some("42".to_string()),
            settings: UserSettings {
                client_id: "client".to_string(),
                ..Default::default()
            },
            ..Default::default()
        });
        session.save_to(&path).unwrap();

        let loaded = SharedSession::load_from(&path).unwrap();
        assert_eq!(loaded.snapshot(), session.snapshot());
    }

    #[test]
    fn test_load_reads_camel_case_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.json");
        std::fs::write(
            &path,
            r#"{"accessToken":"t","settings":{"clientId":"c","clientSecret":"s","redirectUri":"r"}}"#,
        )
        .unwrap();

        let loaded = SharedSession::load_from(&path).unwrap();
        assert_eq!(loaded.access_token(), Some("t".to_string()));
        assert_eq!(loaded.settings().client_secret, "s");
        assert!(!loaded.snapshot().fetch_songs_now);
    }

    #[test]
    fn test_missing_file_is_signed_out() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = SharedSession::load_from(&temp_dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded.snapshot(), User::default());
    }
}
