//! Symmetric sealing of credential material.
//!
//! AES-256-GCM with a process-wide key loaded from the environment at
//! startup. Without a configured key the vault runs on an ephemeral key:
//! fully functional, but sealed material cannot be reopened by a new
//! process; the builder emits a warning event so the operator knows.

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::CentralinoError;
use centralino_types::SealedMaterial;

/// Environment variable carrying the base64-encoded 256-bit vault key.
pub const VAULT_KEY_ENV: &str = "CENTRALINO_VAULT_KEY";

const NONCE_LEN: usize = 12;

/// Plaintext credential material, opened transiently for dispatch.
///
/// Never serializable; `Debug` hides the contents.
pub struct OpenedMaterial(Vec<u8>);

impl OpenedMaterial {
    /// The plaintext bytes, for handing to a provider adapter.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for OpenedMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OpenedMaterial(<redacted>)")
    }
}

/// AES-256-GCM vault sealing and opening credential material.
pub struct Vault {
    cipher: Aes256Gcm,
    ephemeral: bool,
}

impl Vault {
    /// Build a vault from an explicit 256-bit key.
    #[must_use]
    pub fn from_key(key_bytes: &[u8; 32]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key_bytes);
        Self {
            cipher: Aes256Gcm::new(key),
            ephemeral: false,
        }
    }

    /// Build a vault with a freshly generated key.
    ///
    /// Material sealed by this vault cannot be reopened after the process
    /// exits.
    #[must_use]
    pub fn ephemeral() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        Self {
            cipher: Aes256Gcm::new(&key),
            ephemeral: true,
        }
    }

    /// Build a vault from [`VAULT_KEY_ENV`].
    ///
    /// An absent variable yields an ephemeral vault (never fatal); a
    /// present but malformed one is a configuration error.
    ///
    /// # Errors
    /// `Crypto` if the variable is set but is not valid base64 of exactly
    /// 32 bytes.
    pub fn from_env() -> Result<Self, CentralinoError> {
        match std::env::var(VAULT_KEY_ENV) {
            Err(_) => Ok(Self::ephemeral()),
            Ok(raw) => {
                let decoded = BASE64.decode(raw.trim()).map_err(|e| {
                    CentralinoError::Crypto(format!("{VAULT_KEY_ENV} is not valid base64: {e}"))
                })?;
                let key_bytes: [u8; 32] = decoded.try_into().map_err(|_| {
                    CentralinoError::Crypto(format!(
                        "{VAULT_KEY_ENV} must decode to exactly 32 bytes"
                    ))
                })?;
                Ok(Self::from_key(&key_bytes))
            }
        }
    }

    /// Whether the vault runs on a generated key.
    #[must_use]
    pub const fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Seal plaintext material. The result is nonce ‖ ciphertext ‖ tag.
    ///
    /// # Errors
    /// `Crypto` if encryption fails.
    pub fn seal(&self, plaintext: &[u8]) -> Result<SealedMaterial, CentralinoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CentralinoError::Crypto("sealing failed".to_string()))?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(SealedMaterial::from_bytes(out))
    }

    /// Open sealed material.
    ///
    /// # Errors
    /// `Crypto` on tamper or key mismatch; callers must treat the owning
    /// credential as Invalid.
    pub fn open(&self, sealed: &SealedMaterial) -> Result<OpenedMaterial, CentralinoError> {
        let bytes = sealed.as_bytes();
        if bytes.len() <= NONCE_LEN {
            return Err(CentralinoError::Crypto(
                "sealed material too short".to_string(),
            ));
        }
        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CentralinoError::Crypto("integrity check failed".to_string()))?;
        Ok(OpenedMaterial(plaintext))
    }
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("ephemeral", &self.ephemeral)
            .finish_non_exhaustive()
    }
}
