pub mod client;
pub mod models;

pub use client::{ApiClient, ApiError};
pub use models::{RefreshTokenRequest, RefreshTokenResponse};

use crate::playback::PlayerError;

impl From<ApiError> for PlayerError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::TokenRefreshFailed | ApiError::MissingRefreshToken => {
                PlayerError::TokenRefreshFailed
            }
            ApiError::Request(e) => PlayerError::PlaybackCommandFailed(e.to_string()),
        }
    }
}
