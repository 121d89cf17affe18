//! Avatar upload models

use serde::{Deserialize, Serialize};

/// Body of `POST /v1/avatar/prepare`
#[derive(Debug, Clone, Serialize)]
pub struct PrepareAvatarRequest {
    pub thumbnail_image_type: String,
    pub avatar_type: String,
}

impl Default for PrepareAvatarRequest {
    fn default() -> Self {
        Self {
            thumbnail_image_type: "image/png".to_string(),
            avatar_type: "assetbundle".to_string(),
        }
    }
}

/// Pre-signed upload targets for a new avatar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareAvatarResponse {
    pub upload_url: String,
    pub thumbnail_upload_url: String,
    pub avatar_id: String,
}

/// Body of `POST /v1/lora`
#[derive(Debug, Clone, Serialize)]
pub struct RegisterLoraRequest {
    pub avatar_id: String,
}

/// Response body that carries nothing of interest. Any JSON object decodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}
