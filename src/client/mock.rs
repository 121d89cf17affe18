//! Mock Avalab API client for testing
//!
//! Implements the API traits in memory so auth and upload logic can be
//! tested without a server.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::ProgressFn;
use super::api::{AuthApi, AvatarApi};
use super::models::{PrepareAvatarResponse, TokenResponse, UserProfile};
use crate::error::{ApiError, Result};

/// Mock API client for testing.
///
/// # Example
/// ```ignore
/// let mock = MockAvalabClient::new()
///     .with_user(UserProfile { name: "mika".into(), ..Default::default() })
///     .await;
///
/// let profile = mock.current_user("token", None).await?;
/// assert_eq!(mock.call_counts().await.current_user, 1);
/// ```
pub struct MockAvalabClient {
    /// Token pair returned from exchange_code and refresh_token
    token: Arc<Mutex<Option<TokenResponse>>>,
    /// Profile returned from current_user
    user: Arc<Mutex<UserProfile>>,
    /// Upload targets returned from prepare_avatar
    prepared: Arc<Mutex<PrepareAvatarResponse>>,
    /// Error to return (if any) - consumed on first use
    error: Arc<Mutex<Option<ApiError>>>,
    /// Artificial latency of upload_model
    upload_delay: Arc<Mutex<Option<Duration>>>,
    /// Track number of calls for verification
    call_count: Arc<Mutex<CallCounts>>,
}

impl Default for MockAvalabClient {
    fn default() -> Self {
        Self {
            token: Arc::new(Mutex::new(None)),
            user: Arc::new(Mutex::new(UserProfile::default())),
            prepared: Arc::new(Mutex::new(PrepareAvatarResponse {
                upload_url: "https://uploads.test/model".to_string(),
                thumbnail_upload_url: "https://uploads.test/thumbnail".to_string(),
                avatar_id: "mock-avatar".to_string(),
            })),
            error: Arc::new(Mutex::new(None)),
            upload_delay: Arc::new(Mutex::new(None)),
            call_count: Arc::new(Mutex::new(CallCounts::default())),
        }
    }
}

/// Tracks API call counts for test verification
#[derive(Default, Debug, Clone)]
pub struct CallCounts {
    pub exchange_code: usize,
    pub refresh_token: usize,
    pub current_user: usize,
    pub prepare_avatar: usize,
    pub upload_model: usize,
    pub upload_thumbnail: usize,
    pub complete_avatar: usize,
    pub register_lora: usize,
}

impl CallCounts {
    /// Get total number of API calls made.
    pub fn total(&self) -> usize {
        self.exchange_code
            + self.refresh_token
            + self.current_user
            + self.prepare_avatar
            + self.upload_model
            + self.upload_thumbnail
            + self.complete_avatar
            + self.register_lora
    }
}

impl MockAvalabClient {
    /// Create a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the token pair returned by exchange_code and refresh_token.
    pub async fn with_token(self, token: TokenResponse) -> Self {
        *self.token.lock().await = Some(token);
        self
    }

    /// Configure the profile returned by current_user.
    pub async fn with_user(self, user: UserProfile) -> Self {
        *self.user.lock().await = user;
        self
    }

    /// Configure an error to return on the next API call.
    /// The error is consumed after one use.
    pub async fn with_error(self, error: ApiError) -> Self {
        *self.error.lock().await = Some(error);
        self
    }

    /// Make upload_model report half progress, then take `delay` before succeeding.
    pub async fn with_upload_delay(self, delay: Duration) -> Self {
        *self.upload_delay.lock().await = Some(delay);
        self
    }

    /// Get the call counts for verification in tests.
    pub async fn call_counts(&self) -> CallCounts {
        self.call_count.lock().await.clone()
    }

    /// Check if there's a pending error and consume it.
    async fn check_error(&self) -> Result<()> {
        if let Some(e) = self.error.lock().await.take() {
            return Err(e.into());
        }
        Ok(())
    }

    async fn issue_token(&self) -> TokenResponse {
        self.token.lock().await.clone().unwrap_or_else(|| TokenResponse {
            access_token: "mock-access-token".to_string(),
            refresh_token: "mock-refresh-token".to_string(),
            expires_at: (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339(),
            scope: vec![],
        })
    }
}

fn finish(progress: Option<ProgressFn>) {
    if let Some(progress) = progress {
        progress(1.0);
    }
}

// ============================================================================
// AuthApi Implementation
// ============================================================================

#[async_trait]
impl AuthApi for MockAvalabClient {
    async fn exchange_code(&self, _code: &str) -> Result<TokenResponse> {
        self.call_count.lock().await.exchange_code += 1;
        self.check_error().await?;
        Ok(self.issue_token().await)
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenResponse> {
        self.call_count.lock().await.refresh_token += 1;
        self.check_error().await?;
        Ok(self.issue_token().await)
    }
}

// ============================================================================
// AvatarApi Implementation
// ============================================================================

#[async_trait]
impl AvatarApi for MockAvalabClient {
    async fn current_user(
        &self,
        _access_token: &str,
        progress: Option<ProgressFn>,
    ) -> Result<UserProfile> {
        self.call_count.lock().await.current_user += 1;
        self.check_error().await?;
        finish(progress);
        Ok(self.user.lock().await.clone())
    }

    async fn prepare_avatar(
        &self,
        _access_token: &str,
        progress: Option<ProgressFn>,
    ) -> Result<PrepareAvatarResponse> {
        self.call_count.lock().await.prepare_avatar += 1;
        self.check_error().await?;
        finish(progress);
        Ok(self.prepared.lock().await.clone())
    }

    async fn upload_model(
        &self,
        _access_token: &str,
        _upload_url: &str,
        _model_path: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<()> {
        self.call_count.lock().await.upload_model += 1;
        self.check_error().await?;
        let delay = *self.upload_delay.lock().await;
        if let Some(delay) = delay {
            // Half the bytes go out before the delay
            if let Some(progress) = &progress {
                progress(0.5);
            }
            tokio::time::sleep(delay).await;
        }
        finish(progress);
        Ok(())
    }

    async fn upload_thumbnail(
        &self,
        _access_token: &str,
        _upload_url: &str,
        _thumbnail_path: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<()> {
        self.call_count.lock().await.upload_thumbnail += 1;
        self.check_error().await?;
        finish(progress);
        Ok(())
    }

    async fn complete_avatar(
        &self,
        _access_token: &str,
        _avatar_id: &str,
        progress: Option<ProgressFn>,
    ) -> Result<()> {
        self.call_count.lock().await.complete_avatar += 1;
        self.check_error().await?;
        finish(progress);
        Ok(())
    }

    async fn register_lora(
        &self,
        _access_token: &str,
        _avatar_id: &str,
        progress: Option<ProgressFn>,
    ) -> Result<()> {
        self.call_count.lock().await.register_lora += 1;
        self.check_error().await?;
        finish(progress);
        Ok(())
    }
}
