use crate::api::models::{RefreshTokenRequest, RefreshTokenResponse};
use crate::session::SharedSession;
use reqwest::{Client, Error as ReqwestError, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),
    #[error("No refresh token available")]
    MissingRefreshToken,
    #[error("Token refresh failed")]
    TokenRefreshFailed,
}

/// Client for the application backend.
///
/// Requests go out with the session's current access token; a 401 triggers
/// one token refresh and a single retry.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SharedSession,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: SharedSession) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Exchange the refresh token for a new access token and store it in the
    /// session
    pub async fn refresh_token(&self) -> Result<String, ApiError> {
        let user = self.session.snapshot();
        let refresh_token = user
            .refresh_token
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::MissingRefreshToken)?;

        let body = RefreshTokenRequest {
            refresh_token,
            user_id: user.id.unwrap_or_default(),
            client_id: user.settings.client_id,
            client_secret: user.settings.client_secret,
        };

        let url = self.url("refresh_token");
        debug!("POST {}", url);
        let response = self.client.post(&url).json(&body).send().await?;

        if response.status() != StatusCode::OK {
            warn!("Token refresh rejected with {}", response.status());
            return Err(ApiError::TokenRefreshFailed);
        }

        let RefreshTokenResponse { new_access_token } = response
            .json()
            .await
            .map_err(|_| ApiError::TokenRefreshFailed)?;
        self.session.set_access_token(new_access_token.clone());
        info!("Access token refreshed");
        Ok(new_access_token)
    }

    /// Send a request built by `build` with bearer auth.
    ///
    /// `build` is called again with the refreshed token when the first
    /// attempt is rejected with 401. A second 401 is `TokenRefreshFailed`.
    pub async fn send_authorized<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.session.access_token().unwrap_or_default();
        let response = build(&self.client).bearer_auth(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("Request unauthorized, refreshing access token");
        let token = self.refresh_token().await.map_err(|e| {
            warn!("Token refresh failed: {}", e);
            ApiError::TokenRefreshFailed
        })?;

        let response = build(&self.client).bearer_auth(&token).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Request still unauthorized after token refresh");
            return Err(ApiError::TokenRefreshFailed);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::User;

    #[test]
    fn test_url_joins_paths() {
        let client = ApiClient::new("https://api.example.com/", SharedSession::default());
        assert_eq!(
            client.url("/refresh_token"),
            "https://api.example.com/refresh_token"
        );
        assert_eq!(client.url("api/songs"), "https://api.example.com/api/songs");
    }

    #[tokio::test]
    async fn test_refresh_requires_refresh_token() {
        let session = SharedSession::new(User {
            access_token: Some("stale".to_string()),
            ..Default::default()
        });
        let client = ApiClient::new("http://127.0.0.1:9", session);

        let result = client.refresh_token().await;
        assert!(matches!(result, Err(ApiError::MissingRefreshToken)));
    }
}
