//! Per-file key generation and base64 transport encoding

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sealdrop_core::{SealError, SealResult};
use zeroize::Zeroize;

use crate::KEY_SIZE;

/// A per-file 256-bit encryption key. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct Key {
    bytes: [u8; KEY_SIZE],
}

impl Key {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Standard padded base64, the form stored in a transfer manifest.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.bytes)
    }

    pub fn from_base64(encoded: &str) -> SealResult<Self> {
        let mut decoded = STANDARD
            .decode(encoded)
            .map_err(|e| SealError::InvalidKey(format!("base64 decode: {e}")))?;

        if decoded.len() != KEY_SIZE {
            let len = decoded.len();
            decoded.zeroize();
            return Err(SealError::InvalidKey(format!(
                "key has wrong size: {len} bytes (expected {KEY_SIZE})"
            )));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self::from_bytes(bytes))
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key").field("bytes", &"[REDACTED]").finish()
    }
}

/// Generate a random 256-bit key from the operating system CSPRNG.
///
/// Fails with `EntropyUnavailable` rather than returning weak bytes.
pub fn generate_key() -> SealResult<Key> {
    let mut bytes = [0u8; KEY_SIZE];
    fill_random(&mut bytes)?;
    Ok(Key::from_bytes(bytes))
}

pub(crate) fn fill_random(buf: &mut [u8]) -> SealResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| SealError::EntropyUnavailable(e.to_string()))
}
