//! Key derivation: unlock timestamp → AES key via PBKDF2-HMAC-SHA256

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use tlock_core::{TlockError, TlockResult};
use zeroize::Zeroize;

use crate::{KDF_SALT, KEY_SIZE};

/// A 256-bit AES key bound to one unlock timestamp.
///
/// Zeroized on drop.
#[derive(Clone)]
pub struct TimeKey {
    bytes: [u8; KEY_SIZE],
}

impl TimeKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for TimeKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for TimeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// HMAC-SHA256 rounds (default: 100000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: 100_000,
        }
    }
}

/// Derive the note key for `unlock_time_ms`.
///
/// The password is the timestamp's canonical decimal string (`"1700000000000"`),
/// so the same timestamp always yields the same key.
pub fn derive_key(unlock_time_ms: i64, params: &KdfParams) -> TlockResult<TimeKey> {
    if params.iterations == 0 {
        return Err(TlockError::Crypto("PBKDF2 iterations must be non-zero".into()));
    }

    let mut password = unlock_time_ms.to_string().into_bytes();
    // Filled in place so no unzeroized copy of the key is left on the stack
    let mut key = TimeKey {
        bytes: [0u8; KEY_SIZE],
    };
    pbkdf2_hmac::<Sha256>(&password, KDF_SALT, params.iterations, &mut key.bytes);
    password.zeroize();

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: KdfParams = KdfParams { iterations: 10 };

    #[test]
    fn test_kdf_deterministic() {
        let key1 = derive_key(1_700_000_000_000, &FAST).unwrap();
        let key2 = derive_key(1_700_000_000_000, &FAST).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes(), "KDF must be deterministic");
    }

    #[test]
    fn test_kdf_different_timestamps() {
        let key1 = derive_key(1_700_000_000_000, &FAST).unwrap();
        let key2 = derive_key(1_700_000_000_001, &FAST).unwrap();

        assert_ne!(
            key1.as_bytes(),
            key2.as_bytes(),
            "adjacent timestamps must produce different keys"
        );
    }

    #[test]
    fn test_kdf_iterations_matter() {
        let key1 = derive_key(42, &KdfParams { iterations: 10 }).unwrap();
        let key2 = derive_key(42, &KdfParams { iterations: 11 }).unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_kdf_matches_pbkdf2_over_decimal_string() {
        let key = derive_key(1234, &FAST).unwrap();

        let mut expected = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(b"1234", b"text-lock", 10, &mut expected);
        assert_eq!(key.as_bytes(), &expected);
    }

    #[test]
    fn test_dropped_key_bytes_are_zeroed() {
        let mut key = derive_key(7, &FAST).unwrap();
        assert_ne!(key.as_bytes(), &[0u8; KEY_SIZE]);

        // Same zeroize path Drop runs
        key.bytes.zeroize();
        assert_eq!(key.as_bytes(), &[0u8; KEY_SIZE]);
    }

    #[test]
    fn test_kdf_zero_iterations_rejected() {
        let result = derive_key(1, &KdfParams { iterations: 0 });
        assert!(matches!(result, Err(TlockError::Crypto(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = TimeKey::from_bytes([0xAB; KEY_SIZE]);
        let dbg = format!("{key:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("171"));
    }
}
