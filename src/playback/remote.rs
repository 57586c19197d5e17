use crate::playback::error::PlayerError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const GENERIC_PLAY_FAILURE: &str = "Failed to play track";

/// Body of `PUT /me/player/play`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRequest {
    pub uris: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<PlayOffset>,
}

impl PlayRequest {
    /// Request for a single track, without an offset
    pub fn single(uri: impl Into<String>) -> Self {
        Self {
            uris: vec![uri.into()],
            offset: None,
        }
    }
}

/// Position of the target track inside `PlayRequest::uris`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayOffset {
    pub position: usize,
}

#[derive(Debug, Deserialize)]
struct PlayErrorBody {
    error: Option<PlayErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct PlayErrorDetail {
    message: Option<String>,
}

/// Remote play-control endpoint
#[async_trait::async_trait]
pub trait PlayApi: Send + Sync {
    async fn play(
        &self,
        device_id: &str,
        access_token: &str,
        request: &PlayRequest,
    ) -> Result<(), PlayerError>;
}

/// `PlayApi` backed by the web API over HTTPS
#[derive(Clone)]
pub struct WebPlayApi {
    client: Client,
    base_url: String,
}

impl WebPlayApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl PlayApi for WebPlayApi {
    async fn play(
        &self,
        device_id: &str,
        access_token: &str,
        request: &PlayRequest,
    ) -> Result<(), PlayerError> {
        let url = format!("{}/me/player/play", self.base_url);
        debug!(
            "PUT {} device={} uris={} offset={:?}",
            url,
            device_id,
            request.uris.len(),
            request.offset
        );

        let response = self
            .client
            .put(&url)
            .query(&[("device_id", device_id)])
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await
            .map_err(|e| PlayerError::PlaybackCommandFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NO_CONTENT {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Play request rejected with {}: {}", status, body);
        Err(PlayerError::PlaybackCommandFailed(play_error_message(&body)))
    }
}

/// Extract `error.message` from a failed play response, or fall back to a
/// generic message
pub fn play_error_message(body: &str) -> String {
    if body.trim().is_empty() {
        return GENERIC_PLAY_FAILURE.to_string();
    }
    serde_json::from_str::<PlayErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .and_then(|detail| detail.message)
        .unwrap_or_else(|| GENERIC_PLAY_FAILURE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_request_omits_offset() {
        let body = serde_json::to_value(PlayRequest::single("spotify:track:x")).unwrap();
        assert_eq!(body, json!({ "uris": ["spotify:track:x"] }));
    }

    #[test]
    fn test_windowed_request_shape() {
        let request = PlayRequest {
            uris: vec!["a".to_string(), "b".to_string()],
            offset: Some(PlayOffset { position: 1 }),
        };
        assert_eq!(
            serde_json::to_value(request).unwrap(),
            json!({ "uris": ["a", "b"], "offset": { "position": 1 } })
        );
    }

    #[test]
    fn test_error_message_from_body() {
        let body = r#"{"error":{"status":404,"message":"Device not found"}}"#;
        assert_eq!(play_error_message(body), "Device not found");
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(play_error_message(""), GENERIC_PLAY_FAILURE);
        assert_eq!(play_error_message("<html>bad gateway</html>"), GENERIC_PLAY_FAILURE);
        assert_eq!(play_error_message(r#"{"error":{}}"#), GENERIC_PLAY_FAILURE);
        assert_eq!(play_error_message(r#"{"status":500}"#), GENERIC_PLAY_FAILURE);
    }
}
