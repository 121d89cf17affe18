//! Authentication API trait

use async_trait::async_trait;

use crate::client::models::TokenResponse;
use crate::error::Result;

/// OAuth token operations for the Avalab API
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange an authorization code for a token pair
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse>;

    /// Trade a refresh token for a new token pair
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse>;
}
