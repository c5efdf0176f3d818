//! Vault used by sealed persistence handlers. Serialized envelope bytes go in,
//! a `SealedPayload` (random nonce, ChaCha20-Poly1305 ciphertext with its tag)
//! comes out and is stored in place of the plain envelope.

use std::fmt;
use std::fs;
use std::path::Path;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

use crate::crypto::integrity::hkdf_expand;

const TAG_SIZE: usize = 16;
const DERIVED_KEY_LEN: usize = 32;
const ARGON2_MEMORY_KIB: u32 = 19 * 1024;
const ARGON2_ITERATIONS: u32 = 3;
const ARGON2_LANES: u32 = 1;
const SUBKEY_SALT: &[u8] = b"binconf:subkey:v1";

#[derive(Debug, Error)]
pub enum SecretVaultError {
    #[error("invalid key length; expected 32 bytes")]
    InvalidKeyLength,
    #[error("key derivation failed: {0}")]
    DerivationFailed(String),
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),
    #[error("key source unreadable: {0}")]
    KeySourceUnreadable(String),
    #[error("base64 decoding failed: {0}")]
    Base64DecodeFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// 32 byte ChaCha20-Poly1305 key. Zeroed on drop.
pub struct SecretVault {
    key: Key,
}

impl SecretVault {
    pub fn from_key_bytes(key_bytes: &[u8]) -> Result<Self, SecretVaultError> {
        match key_bytes.len() {
            DERIVED_KEY_LEN => Ok(Self {
                key: Key::clone_from_slice(key_bytes),
            }),
            _ => Err(SecretVaultError::InvalidKeyLength),
        }
    }

    /// Master key given as unpadded base64 in the environment variable `var`.
    pub fn from_env_var(var: &str) -> Result<Self, SecretVaultError> {
        let encoded = std::env::var(var)
            .map_err(|e| SecretVaultError::KeySourceUnreadable(format!("{var}: {e}")))?;
        Self::from_base64(encoded.trim())
    }

    /// Master key given as unpadded base64 in a key file; surrounding
    /// whitespace is ignored.
    pub fn from_key_file(path: &Path) -> Result<Self, SecretVaultError> {
        let content = fs::read_to_string(path)
            .map_err(|e| SecretVaultError::KeySourceUnreadable(format!("{}: {e}", path.display())))?;
        Self::from_base64(content.trim())
    }

    fn from_base64(encoded: &str) -> Result<Self, SecretVaultError> {
        let mut decoded = STANDARD_NO_PAD
            .decode(encoded.as_bytes())
            .map_err(|e| SecretVaultError::Base64DecodeFailed(format!("{e}")))?;
        let vault = Self::from_key_bytes(&decoded);
        decoded.zeroize();
        vault
    }

    /// Master key stretched from a passphrase with Argon2id. The same
    /// passphrase and salt always give the same key, so sealed files stay
    /// readable across runs.
    pub fn derive_from_passphrase(passphrase: &str, salt: &[u8]) -> Result<Self, SecretVaultError> {
        let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_ITERATIONS, ARGON2_LANES, Some(DERIVED_KEY_LEN))
            .map_err(|e| SecretVaultError::DerivationFailed(format!("{e}")))?;

        let mut stretched = [0u8; DERIVED_KEY_LEN];
        let derived = Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(passphrase.as_bytes(), salt, &mut stretched)
            .map_err(|e| SecretVaultError::DerivationFailed(format!("{e}")))
            .and_then(|()| Self::from_key_bytes(&stretched));
        stretched.zeroize();
        derived
    }

    /// Derives an independent vault for one purpose via HKDF-SHA256.
    pub fn derive_subkey(&self, info: &[u8]) -> Result<Self, SecretVaultError> {
        let mut okm = hkdf_expand(self.key.as_slice(), SUBKEY_SALT, info, DERIVED_KEY_LEN)
            .map_err(|e| SecretVaultError::DerivationFailed(format!("{e}")))?;
        let vault = Self::from_key_bytes(&okm);
        okm.zeroize();
        vault
    }

    /// Encrypts `plaintext`, binding `aad` into the authentication tag.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<SealedPayload, SecretVaultError> {
        let cipher = ChaCha20Poly1305::new(&self.key);
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, Payload { msg: plaintext, aad })
            .map_err(|e| SecretVaultError::EncryptionFailed(format!("{e}")))?;
        if ciphertext.len() < TAG_SIZE {
            return Err(SecretVaultError::EncryptionFailed(
                "ciphertext shorter than authentication tag".to_string(),
            ));
        }

        Ok(SealedPayload {
            nonce: nonce.to_vec(),
            ciphertext,
        })
    }

    /// Decrypts a payload produced by `seal` with the same key and `aad`.
    pub fn open(&self, sealed: &SealedPayload, aad: &[u8]) -> Result<Vec<u8>, SecretVaultError> {
        if sealed.nonce.len() != Nonce::default().len() {
            return Err(SecretVaultError::DecryptionFailed(
                "nonce length mismatch".to_string(),
            ));
        }
        if sealed.ciphertext.len() < TAG_SIZE {
            return Err(SecretVaultError::DecryptionFailed(
                "ciphertext shorter than authentication tag".to_string(),
            ));
        }

        let cipher = ChaCha20Poly1305::new(&self.key);
        cipher
            .decrypt(
                Nonce::from_slice(&sealed.nonce),
                Payload {
                    msg: sealed.ciphertext.as_slice(),
                    aad,
                },
            )
            .map_err(|e| SecretVaultError::DecryptionFailed(format!("{e}")))
    }
}

impl fmt::Debug for SecretVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretVault").field("key", &"<redacted>").finish()
    }
}

impl Drop for SecretVault {
    fn drop(&mut self) {
        self.key.as_mut_slice().zeroize();
    }
}
