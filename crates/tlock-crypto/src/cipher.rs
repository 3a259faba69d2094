//! Timestamp-keyed encrypt/decrypt, the seam the lifecycle manager is built on

use tlock_core::{SealedPayload, TlockResult};

use crate::kdf::{derive_key, KdfParams};
use crate::seal::{open, seal};

/// Encrypt and decrypt note text keyed by an unlock timestamp.
///
/// Calls are blocking (key derivation is deliberately slow); async callers
/// should move them off the runtime threads.
pub trait TimeLock: Send + Sync {
    fn encrypt(&self, plaintext: &str, unlock_time_ms: i64) -> TlockResult<SealedPayload>;

    /// `unlock_time_ms` must be the exact timestamp used to encrypt.
    fn decrypt(&self, payload: &SealedPayload, unlock_time_ms: i64) -> TlockResult<String>;
}

/// PBKDF2 + AES-256-GCM time-lock cipher.
#[derive(Debug, Clone, Default)]
pub struct TimeLockCipher {
    params: KdfParams,
}

impl TimeLockCipher {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }
}

impl TimeLock for TimeLockCipher {
    fn encrypt(&self, plaintext: &str, unlock_time_ms: i64) -> TlockResult<SealedPayload> {
        let key = derive_key(unlock_time_ms, &self.params)?;
        seal(&key, plaintext)
    }

    fn decrypt(&self, payload: &SealedPayload, unlock_time_ms: i64) -> TlockResult<String> {
        let key = derive_key(unlock_time_ms, &self.params)?;
        open(&key, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tlock_core::TlockError;

    fn cipher() -> TimeLockCipher {
        TimeLockCipher::new(KdfParams { iterations: 10 })
    }

    #[test]
    fn test_roundtrip() {
        let c = cipher();
        let sealed = c.encrypt("secret", 1_700_000_002_000).unwrap();
        assert_eq!(c.decrypt(&sealed, 1_700_000_002_000).unwrap(), "secret");
    }

    #[test]
    fn test_wrong_timestamp_rejected() {
        let c = cipher();
        let sealed = c.encrypt("secret", 1_700_000_002_000).unwrap();
        assert!(matches!(
            c.decrypt(&sealed, 1_700_000_002_001),
            Err(TlockError::Decryption)
        ));
    }

    #[test]
    fn test_separate_instances_agree() {
        let sealed = cipher().encrypt("kept", 99).unwrap();
        assert_eq!(cipher().decrypt(&sealed, 99).unwrap(), "kept");
    }

    #[test]
    fn test_iteration_mismatch_rejected() {
        let sealed = cipher().encrypt("kept", 99).unwrap();
        let other = TimeLockCipher::new(KdfParams { iterations: 11 });
        assert!(other.decrypt(&sealed, 99).is_err());
    }

    #[test]
    fn test_default_params() {
        assert_eq!(TimeLockCipher::default().params().iterations, 100_000);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn roundtrip_any_text(text in ".{0,200}", ts in 0i64..4_102_444_800_000) {
            let c = cipher();
            let sealed = c.encrypt(&text, ts).unwrap();
            prop_assert_eq!(c.decrypt(&sealed, ts).unwrap(), text);
        }

        #[test]
        fn other_timestamp_never_opens(ts in 0i64..4_102_444_800_000, delta in 1i64..1_000_000) {
            let c = cipher();
            let sealed = c.encrypt("x", ts).unwrap();
            prop_assert!(c.decrypt(&sealed, ts + delta).is_err());
        }
    }
}
