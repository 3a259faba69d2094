//! tlock-crypto: the time-lock cipher
//!
//! The unlock timestamp is the only key material:
//! ```text
//! unlock_time (epoch ms) ─► decimal string ─► PBKDF2-HMAC-SHA256 (salt "text-lock") ─► 256-bit key
//! key + random 96-bit nonce ─► AES-256-GCM (no AAD) ─► { iv, ciphertext || tag }
//! ```
//!
//! There is no other secret. Anyone holding a note record can scan candidate
//! timestamps; the PBKDF2 cost is the only friction.

pub mod cipher;
pub mod kdf;
pub mod seal;

pub use cipher::{TimeLock, TimeLockCipher};
pub use kdf::{derive_key, KdfParams, TimeKey};
pub use seal::{open, seal};

/// AES-256 key size in bytes
pub const KEY_SIZE: usize = 32;

/// AES-GCM nonce size (96-bit)
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size
pub const TAG_SIZE: usize = 16;

/// Fixed application salt shared by every note.
pub const KDF_SALT: &[u8] = b"text-lock";
