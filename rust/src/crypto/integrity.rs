//! SHA-256 fingerprints of stored files (used by `binconf digest`) and the
//! HKDF expansion the vault uses to derive its file key.

use hex::ToHex;
use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("hkdf expansion failed: {0}")]
    HkdfFailed(String),
}

pub fn sha256_digest(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Lowercase hex SHA-256, the form printed for stored files.
pub fn sha256_hex(data: &[u8]) -> String {
    sha256_digest(data).encode_hex()
}

/// HKDF-SHA256 extract-then-expand into `length` bytes. Fails only when
/// `length` exceeds 255 hash blocks.
pub fn hkdf_expand(secret: &[u8], salt: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>, IntegrityError> {
    let mut okm = vec![0u8; length];
    Hkdf::<Sha256>::new(Some(salt), secret)
        .expand(info, &mut okm)
        .map_err(|e| IntegrityError::HkdfFailed(format!("{e}")))?;
    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::{hkdf_expand, sha256_digest, sha256_hex};

    #[test]
    fn hashes_to_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(sha256_digest(b"").len(), 32);
    }

    #[test]
    fn expands_with_hkdf() {
        let okm = hkdf_expand(b"ikm", b"salt", b"info", 42).expect("hkdf should work");
        assert_eq!(okm.len(), 42);
        let other = hkdf_expand(b"ikm", b"salt", b"other", 42).expect("hkdf should work");
        assert_ne!(okm, other);
    }

    #[test]
    fn rejects_oversized_output() {
        assert!(hkdf_expand(b"ikm", b"salt", b"info", 255 * 32 + 1).is_err());
    }
}
