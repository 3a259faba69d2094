//! AES-256-GCM sealing of note text
//!
//! Sealed format:
//! ```text
//! iv   = 12 random bytes
//! data = ciphertext || 16-byte GCM tag      (no AAD)
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use tlock_core::{SealedPayload, TlockError, TlockResult};

use crate::kdf::TimeKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn seal(key: &TimeKey, plaintext: &str) -> TlockResult<SealedPayload> {
    let mut iv = [0u8; NONCE_SIZE];
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|e| TlockError::Crypto(format!("nonce generation failed: {e}")))?;

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let data = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|e| TlockError::Crypto(format!("AES-256-GCM encryption failed: {e}")))?;

    Ok(SealedPayload {
        iv: iv.to_vec(),
        data,
    })
}

/// Verify and decrypt a sealed payload.
///
/// Wrong key, tampering, a malformed nonce and non-UTF-8 output all fail with
/// the same `Decryption` error.
pub fn open(key: &TimeKey, payload: &SealedPayload) -> TlockResult<String> {
    if payload.iv.len() != NONCE_SIZE {
        tracing::debug!(len = payload.iv.len(), "sealed payload has malformed nonce");
        return Err(TlockError::Decryption);
    }
    if payload.data.len() < TAG_SIZE {
        tracing::debug!(len = payload.data.len(), "sealed payload shorter than tag");
        return Err(TlockError::Decryption);
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&payload.iv), payload.data.as_ref())
        .map_err(|_| TlockError::Decryption)?;

    String::from_utf8(plaintext).map_err(|_| TlockError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KEY_SIZE;

    fn key(b: u8) -> TimeKey {
        TimeKey::from_bytes([b; KEY_SIZE])
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let k = key(7);
        let sealed = seal(&k, "meet me at noon").unwrap();
        assert_eq!(open(&k, &sealed).unwrap(), "meet me at noon");
    }

    #[test]
    fn test_seal_open_empty() {
        let k = key(7);
        let sealed = seal(&k, "").unwrap();
        assert_eq!(sealed.data.len(), TAG_SIZE);
        assert_eq!(open(&k, &sealed).unwrap(), "");
    }

    #[test]
    fn test_sealed_size() {
        let sealed = seal(&key(1), "héllo").unwrap();
        assert_eq!(sealed.iv.len(), NONCE_SIZE);
        // "héllo" is 6 UTF-8 bytes
        assert_eq!(sealed.data.len(), 6 + TAG_SIZE);
    }

    #[test]
    fn test_open_wrong_key() {
        let sealed = seal(&key(1), "secret").unwrap();
        assert!(matches!(open(&key(2), &sealed), Err(TlockError::Decryption)));
    }

    #[test]
    fn test_tampered_data() {
        let k = key(3);
        let mut sealed = seal(&k, "secret").unwrap();
        sealed.data[0] ^= 0xFF;
        assert!(matches!(open(&k, &sealed), Err(TlockError::Decryption)));
    }

    #[test]
    fn test_tampered_tag() {
        let k = key(3);
        let mut sealed = seal(&k, "secret").unwrap();
        let last = sealed.data.len() - 1;
        sealed.data[last] ^= 0x01;
        assert!(matches!(open(&k, &sealed), Err(TlockError::Decryption)));
    }

    #[test]
    fn test_malformed_nonce() {
        let k = key(3);
        let mut sealed = seal(&k, "secret").unwrap();
        sealed.iv.pop();
        assert!(matches!(open(&k, &sealed), Err(TlockError::Decryption)));
    }

    #[test]
    fn test_truncated_data() {
        let k = key(3);
        let sealed = SealedPayload {
            iv: vec![0; NONCE_SIZE],
            data: vec![1, 2, 3],
        };
        assert!(matches!(open(&k, &sealed), Err(TlockError::Decryption)));
    }

    #[test]
    fn test_nonces_differ() {
        let k = key(9);
        let a = seal(&k, "same").unwrap();
        let b = seal(&k, "same").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.data, b.data);
    }
}
