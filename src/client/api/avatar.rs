//! Avatar API trait

use std::path::Path;

use async_trait::async_trait;

use crate::client::ProgressFn;
use crate::client::models::{PrepareAvatarResponse, UserProfile};
use crate::error::Result;

/// Bearer-authenticated operations. `progress` receives whole-percent steps
/// while the request body is sent and a final `1.0` on success.
#[async_trait]
pub trait AvatarApi: Send + Sync {
    /// Fetch the signed-in user's profile
    async fn current_user(
        &self,
        access_token: &str,
        progress: Option<ProgressFn>,
    ) -> Result<UserProfile>;

    /// Reserve an avatar id and its pre-signed upload URLs
    async fn prepare_avatar(
        &self,
        access_token: &str,
        progress: Option<ProgressFn>,
    ) -> Result<PrepareAvatarResponse>;

    /// PUT the asset bundle to its pre-signed URL
    async fn upload_model(
        &self,
        access_token: &str,
        upload_url: &str,
        model_path: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<()>;

    /// PUT the PNG thumbnail to its pre-signed URL
    async fn upload_thumbnail(
        &self,
        access_token: &str,
        upload_url: &str,
        thumbnail_path: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<()>;

    /// Mark both uploads as finished
    async fn complete_avatar(
        &self,
        access_token: &str,
        avatar_id: &str,
        progress: Option<ProgressFn>,
    ) -> Result<()>;

    /// Register the avatar for training
    async fn register_lora(
        &self,
        access_token: &str,
        avatar_id: &str,
        progress: Option<ProgressFn>,
    ) -> Result<()>;
}
