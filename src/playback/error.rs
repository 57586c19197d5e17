use thiserror::Error;

/// Errors surfaced by the playback controller.
///
/// Every variant is non-fatal: the controller records the latest one in
/// `PlaybackSession::last_error` and stays usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    #[error("No access token available")]
    MissingToken,
    #[error("Player not ready")]
    PlayerNotReady,
    #[error("Playback SDK failed to load: {0}")]
    SdkLoadFailed(String),
    #[error("{0}")]
    DeviceInitError(String),
    #[error("Authentication failed. Please re-authorize.")]
    AuthFailed,
    #[error("Spotify Premium required for playback")]
    PremiumRequired,
    #[error("{0}")]
    PlaybackCommandFailed(String),
    #[error("Token refresh failed")]
    TokenRefreshFailed,
    #[error("Playback service is not running")]
    ServiceStopped,
}
