//! OAuth token exchange models

use serde::{Deserialize, Serialize};

/// OAuth grant used against `/v1/authorize/token`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
}

/// Body of a token exchange
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest {
    pub grant_type: GrantType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    pub client_id: String,

    pub redirect_uri: String,
}

impl TokenRequest {
    /// Exchange an authorization code captured by the redirect listener
    pub fn authorization_code(code: &str, client_id: &str, redirect_uri: &str) -> Self {
        Self {
            grant_type: GrantType::AuthorizationCode,
            code: Some(code.to_string()),
            refresh_token: None,
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
        }
    }

    /// Trade a refresh token for a new token pair
    pub fn refresh(refresh_token: &str, client_id: &str, redirect_uri: &str) -> Self {
        Self {
            grant_type: GrantType::RefreshToken,
            code: None,
            refresh_token: Some(refresh_token.to_string()),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
        }
    }
}

/// Token pair returned by the authorization server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    pub refresh_token: String,

    /// Absolute expiry timestamp, as sent by the server
    pub expires_at: String,

    #[serde(default)]
    pub scope: Vec<String>,
}
