//! Encryption at rest for stored secrets
//!
//! A [`SecretSealer`] turns plaintext into an opaque blob and back. The token
//! store picks one at construction time and falls back to [`PlaintextSealer`]
//! when sealing fails.

use std::fmt;
use std::path::Path;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use thiserror::Error;

/// AES-GCM nonce length in bytes
const NONCE_LEN: usize = 12;

/// Associated data bound into every sealed blob
const ASSOCIATED_DATA: &[u8] = b"avalab";

/// Sealing failures. Never surfaced to users; the store degrades instead.
#[derive(Debug, Error)]
pub enum SealError {
    #[error("sealing key unavailable: {0}")]
    Key(String),

    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// Which protection was applied to a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealMethod {
    Sealed,
    Plaintext,
}

impl fmt::Display for SealMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SealMethod::Sealed => write!(f, "encrypted"),
            SealMethod::Plaintext => write!(f, "plaintext"),
        }
    }
}

/// Pluggable encryption-at-rest capability
pub trait SecretSealer: Send + Sync {
    /// Protection this sealer applies
    fn method(&self) -> SealMethod;

    /// Protect `plaintext`
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError>;

    /// Reverse [`seal`](Self::seal)
    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>, SealError>;
}

/// No-op sealer used when encryption is disabled or unavailable
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextSealer;

impl SecretSealer for PlaintextSealer {
    fn method(&self) -> SealMethod {
        SealMethod::Plaintext
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
        Ok(plaintext.to_vec())
    }

    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>, SealError> {
        Ok(sealed.to_vec())
    }
}

/// AES-256-GCM sealer keyed by a per-user key file
pub struct AesGcmSealer {
    cipher: Aes256Gcm,
}

impl fmt::Debug for AesGcmSealer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmSealer").finish_non_exhaustive()
    }
}

impl AesGcmSealer {
    /// Create a sealer from raw key bytes
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Load the key from `path`, generating it (mode 600) on first use
    pub fn from_key_file(path: &Path) -> Result<Self, SealError> {
        if path.exists() {
            let bytes = std::fs::read(path).map_err(|e| SealError::Key(e.to_string()))?;
            let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                SealError::Key(format!(
                    "{} holds {} bytes, expected 32",
                    path.display(),
                    bytes.len()
                ))
            })?;
            return Ok(Self::new(&key));
        }

        let key = Aes256Gcm::generate_key(&mut OsRng);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SealError::Key(e.to_string()))?;
        }
        std::fs::write(path, key.as_slice()).map_err(|e| SealError::Key(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| SealError::Key(e.to_string()))?;
        }

        log::debug!("Generated token sealing key at {}", path.display());
        Ok(Self {
            cipher: Aes256Gcm::new(&key),
        })
    }
}

impl SecretSealer for AesGcmSealer {
    fn method(&self) -> SealMethod {
        SealMethod::Sealed
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: ASSOCIATED_DATA,
                },
            )
            .map_err(|_| SealError::Encrypt)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(nonce.as_slice());
        combined.extend_from_slice(&ciphertext);
        Ok(combined)
    }

    fn unseal(&self, sealed: &[u8]) -> Result<Vec<u8>, SealError> {
        if sealed.len() < NONCE_LEN {
            return Err(SealError::Decrypt("ciphertext too short".to_string()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: ASSOCIATED_DATA,
                },
            )
            .map_err(|_| SealError::Decrypt("authentication tag mismatch".to_string()))
    }
}
