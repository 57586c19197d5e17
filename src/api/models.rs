use serde::{Deserialize, Serialize};

/// Body of `POST /refresh_token`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
    pub user_id: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Successful `POST /refresh_token` response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshTokenResponse {
    pub new_access_token: String,
}
