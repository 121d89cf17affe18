//! OAuth token record

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::models::TokenResponse;
use crate::error::ApiError;

/// Access/refresh token pair with its absolute expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    /// True when the access token can no longer be used
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expiry check against an explicit clock. A token expiring exactly at
    /// `now` counts as expired, as does a token without an expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => expires_at <= now,
        }
    }
}

impl TryFrom<TokenResponse> for TokenRecord {
    type Error = ApiError;

    fn try_from(response: TokenResponse) -> Result<Self, Self::Error> {
        let expires_at = parse_expiry(&response.expires_at).ok_or_else(|| {
            ApiError::DecodeFailed {
                message: format!("unparseable expires_at '{}'", response.expires_at),
                body: String::new(),
            }
        })?;

        Ok(Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: Some(expires_at),
        })
    }
}

/// Parse the server's expiry timestamp. RFC 3339 is expected; offset-less
/// timestamps are read as UTC.
fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
