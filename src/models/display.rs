//! Display model implementations for table and JSON output

use serde::Serialize;
use tabled::Tabled;

use crate::avatar::PackagedAvatar;
use crate::client::models::UserProfile;
use crate::upload::UploadOutcome;

/// Signed-in user summary
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct ProfileDisplay {
    #[tabled(rename = "USER")]
    pub name: String,

    #[tabled(rename = "PLAN")]
    pub plan: String,

    #[tabled(rename = "POINTS")]
    pub available_points: i64,

    #[tabled(rename = "TODAY")]
    pub generation_left_today: i64,

    #[tabled(rename = "MONTH")]
    pub generation_left_monthly: i64,

    /// Avatar registrations still allowed
    #[tabled(rename = "REGISTRATIONS")]
    pub model_registration_left: i64,
}

impl From<&UserProfile> for ProfileDisplay {
    fn from(profile: &UserProfile) -> Self {
        Self {
            name: profile.label().to_string(),
            plan: profile
                .subscription
                .as_ref()
                .map(|s| s.title.clone())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "free".to_string()),
            available_points: profile.available_points,
            generation_left_today: profile.generation_left_today,
            generation_left_monthly: profile.generation_left_monthly,
            model_registration_left: profile.model_registration_left,
        }
    }
}

/// Packaged avatar summary
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct AvatarDisplay {
    #[tabled(rename = "AVATAR")]
    pub name: String,

    #[tabled(rename = "BUNDLE")]
    pub bundle: String,

    #[tabled(rename = "SIZE")]
    pub size: String,

    #[tabled(rename = "SHA-256")]
    pub sha256: String,

    #[tabled(rename = "WARNINGS")]
    pub warnings: usize,
}

impl From<&PackagedAvatar> for AvatarDisplay {
    fn from(avatar: &PackagedAvatar) -> Self {
        Self {
            name: avatar.name.clone(),
            bundle: avatar.model_path.display().to_string(),
            size: format_size(avatar.model_size),
            sha256: avatar.model_sha256.clone(),
            warnings: avatar.warnings.len(),
        }
    }
}

/// Finished upload summary
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct UploadDisplay {
    #[tabled(rename = "AVATAR ID")]
    pub avatar_id: String,

    #[tabled(rename = "AVATAR")]
    pub name: String,

    #[tabled(rename = "SIZE")]
    pub size: String,

    #[tabled(rename = "REGISTRATIONS LEFT")]
    pub model_registration_left: i64,
}

impl From<&UploadOutcome> for UploadDisplay {
    fn from(outcome: &UploadOutcome) -> Self {
        Self {
            avatar_id: outcome.avatar_id.clone(),
            name: outcome.avatar.name.clone(),
            size: format_size(outcome.avatar.model_size),
            model_registration_left: outcome.profile.model_registration_left,
        }
    }
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::models::Subscription;
    use std::path::PathBuf;

    #[test]
    fn test_profile_display_plan() {
        let profile = UserProfile {
            name: "mika".to_string(),
            display_name: Some("Mika".to_string()),
            model_registration_left: 2,
            subscription: Some(Subscription {
                title: "Creator".to_string(),
                ..Subscription::default()
            }),
            ..UserProfile::default()
        };

        let display = ProfileDisplay::from(&profile);
        assert_eq!(display.name, "Mika");
        assert_eq!(display.plan, "Creator");
        assert_eq!(display.model_registration_left, 2);

        let display = ProfileDisplay::from(&UserProfile::default());
        assert_eq!(display.plan, "free");
    }

    #[test]
    fn test_avatar_display() {
        let avatar = PackagedAvatar {
            name: "mika".to_string(),
            model_path: PathBuf::from("/tmp/mika.bundle"),
            thumbnail_path: PathBuf::from("/tmp/mika.png"),
            model_size: 3 * 1024 * 1024,
            model_sha256: "abc".to_string(),
            warnings: vec!["particles".to_string()],
        };

        let display = AvatarDisplay::from(&avatar);
        assert_eq!(display.size, "3.0 MiB");
        assert_eq!(display.warnings, 1);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KiB");
    }
}
