//! Keyed 64-bit hashing with a per-world secret.
//!
//! The [`KeyedHash64`] capability maps bytes to a 64-bit digest under a
//! 16-byte key. [`Secret`] implements it as HMAC-SHA-256 truncated to the
//! first eight bytes of the tag. Collision resistance is that of a 64-bit
//! short hash, which is all value identities need.

use std::fmt;

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of a world secret in bytes.
pub const SECRET_BYTES: usize = 16;

/// A keyed 64-bit hash function.
pub trait KeyedHash64 {
    /// Hash `data` under this key.
    fn hash64(&self, data: &[u8]) -> u64;
}

/// A 16-byte hashing key, generated fresh for every world.
///
/// The key is never persisted; hashes made with one secret are meaningless
/// under another.
#[derive(Clone)]
pub struct Secret {
    key: [u8; SECRET_BYTES],
    mac: HmacSha256,
}

impl Secret {
    /// Generate a secret from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut key = [0u8; SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut key);
        Self::from_bytes(key)
    }

    /// Use a caller-supplied key. Intended for reproducible tests.
    pub fn from_bytes(key: [u8; SECRET_BYTES]) -> Self {
        let mac = match HmacSha256::new_from_slice(&key) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC accepts keys of any length"),
        };
        Self { key, mac }
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SECRET_BYTES] {
        &self.key
    }

    /// Start an incremental hash under this key.
    pub fn hasher(&self) -> KeyedHasher {
        KeyedHasher {
            mac: self.mac.clone(),
        }
    }
}

impl KeyedHash64 for Secret {
    fn hash64(&self, data: &[u8]) -> u64 {
        let mut h = self.hasher();
        h.update(data);
        h.finish()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Incremental form of [`KeyedHash64`]: feed several slices, get one digest.
///
/// Equivalent to hashing the concatenation of everything passed to
/// [`update`](KeyedHasher::update).
pub struct KeyedHasher {
    mac: HmacSha256,
}

impl KeyedHasher {
    /// Append bytes to the hashed message.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.mac.update(data);
        self
    }

    /// Finish and return the first eight tag bytes as a little-endian `u64`.
    pub fn finish(self) -> u64 {
        let tag = self.mac.finalize().into_bytes();
        let mut head = [0u8; 8];
        head.copy_from_slice(&tag[..8]);
        u64::from_le_bytes(head)
    }
}
