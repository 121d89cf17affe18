//! Signed-in user profile

use serde::{Deserialize, Serialize};

/// Profile returned by `GET /v1/user/current`. Absent fields take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub display_name: Option<String>,
    pub last_signed_in_at: Option<String>,
    pub available_points: i64,
    pub generation_left_today: i64,
    pub generation_left_monthly: i64,
    /// Avatar registrations still allowed
    pub model_registration_left: i64,
    pub model_retention_left: i64,
    pub has_vrh_authz: bool,
    pub preferred_language: Option<String>,
    pub subscription: Option<Subscription>,
    pub has_never_subscribed_any_plan: bool,
    pub is_developer: bool,
}

impl UserProfile {
    /// Name to greet the user with
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.name)
    }
}

/// Active subscription plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscription {
    pub plan_id: String,
    pub last_renewed_at: Option<String>,
    pub since: Option<String>,
    pub expires_at: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub cancellation_requested_at: Option<String>,
    pub generation_cap_per_day: i64,
    pub generation_cap_per_month: i64,
    pub is_no_watermark: bool,
    pub is_annual: bool,
    pub variable_image_size: bool,
}
