//! Persistent token storage
//!
//! The token record lives under a single key of the preference store, either
//! sealed (`sealed:v1:` + base64 of nonce and ciphertext) or as plaintext JSON.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};

use super::TokenRecord;
use super::sealer::{PlaintextSealer, SealMethod, SecretSealer};
use crate::error::Result;
use crate::store::PreferenceStore;

/// Preference key holding the token record
pub const TOKEN_KEY: &str = "AvalabAuthorizationData";

/// Prefix marking a sealed value
const SEALED_PREFIX: &str = "sealed:v1:";

/// Token persistence over a preference store and a sealer
pub struct TokenStore {
    prefs: PreferenceStore,
    sealer: Box<dyn SecretSealer>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("method", &self.sealer.method())
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    pub fn new(prefs: PreferenceStore, sealer: Box<dyn SecretSealer>) -> Self {
        Self { prefs, sealer }
    }

    /// Persist `record`, or delete the stored record when `None`.
    ///
    /// Returns the protection that was applied. A sealing failure is logged
    /// and the record is written as plaintext instead.
    pub fn save(&self, record: Option<&TokenRecord>) -> Result<Option<SealMethod>> {
        let Some(record) = record else {
            self.prefs.delete(TOKEN_KEY)?;
            log::debug!("Cleared stored token");
            return Ok(None);
        };

        let json = serde_json::to_string(record)?;

        let (value, method) = if self.sealer.method() == SealMethod::Plaintext {
            (json, SealMethod::Plaintext)
        } else {
            match self.sealer.seal(json.as_bytes()) {
                Ok(sealed) => (
                    format!("{}{}", SEALED_PREFIX, general_purpose::STANDARD.encode(sealed)),
                    SealMethod::Sealed,
                ),
                Err(e) => {
                    log::warn!("Token encryption failed ({}); storing token unencrypted", e);
                    (json, PlaintextSealer.method())
                }
            }
        };

        self.prefs.set_string(TOKEN_KEY, &value)?;
        Ok(Some(method))
    }

    /// Load the stored record.
    ///
    /// Anything that cannot be unsealed resets the stored value and reads as
    /// "no token"; unparseable JSON also reads as "no token".
    pub fn load(&self) -> Option<TokenRecord> {
        let value = match self.prefs.get_string(TOKEN_KEY) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Could not read stored token: {}", e);
                return None;
            }
        };

        let json = match value.strip_prefix(SEALED_PREFIX) {
            Some(encoded) => match self.unseal(encoded) {
                Some(json) => json,
                None => {
                    self.reset();
                    return None;
                }
            },
            None => value,
        };

        match serde_json::from_str(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Stored token is not valid JSON: {}", e);
                None
            }
        }
    }

    /// When the stored record was last written
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        match self.prefs.updated_at(TOKEN_KEY) {
            Ok(secs) => secs.and_then(|s| DateTime::from_timestamp(s, 0)),
            Err(e) => {
                log::debug!("Could not read token timestamp: {}", e);
                None
            }
        }
    }

    /// Protection applied to new saves
    pub fn method(&self) -> SealMethod {
        self.sealer.method()
    }

    fn unseal(&self, encoded: &str) -> Option<String> {
        let sealed = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| log::warn!("Stored token is not valid base64: {}", e))
            .ok()?;
        let plain = self
            .sealer
            .unseal(&sealed)
            .map_err(|e| log::warn!("Could not decrypt stored token: {}", e))
            .ok()?;
        String::from_utf8(plain)
            .map_err(|e| log::warn!("Decrypted token is not UTF-8: {}", e))
            .ok()
    }

    fn reset(&self) {
        if let Err(e) = self.prefs.set_string(TOKEN_KEY, "") {
            log::warn!("Could not reset stored token: {}", e);
        }
    }
}
