//! Whole-payload AES-256-GCM sealing
//!
//! A fresh nonce is drawn for every call and prefixed to the output, so an
//! envelope decrypts with nothing but the key. No associated data is bound.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use sealdrop_core::{SealError, SealResult};

use crate::keys::{fill_random, Key};
use crate::NONCE_SIZE;

/// Encrypt `plaintext` under `key`.
///
/// Returns: `[12-byte nonce][ciphertext][16-byte tag]`
pub fn encrypt(plaintext: &[u8], key: &Key) -> SealResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    fill_random(&mut nonce_bytes)?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    // Only fails for plaintexts beyond the GCM length limit (~64 GiB)
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| SealError::Other(anyhow::anyhow!("encryption failed: {e}")))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt an envelope produced by [`encrypt`].
///
/// Envelopes shorter than the nonce are rejected before any AEAD work.
pub fn decrypt(envelope: &[u8], key: &Key) -> SealResult<Vec<u8>> {
    if envelope.len() < NONCE_SIZE {
        return Err(SealError::MalformedEnvelope {
            len: envelope.len(),
        });
    }

    let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| SealError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key;
    use crate::{KEY_SIZE, TAG_SIZE};
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_key().unwrap();
        let plaintext = b"Hello, Swarm! This is a secret message.";

        let encrypted = encrypt(plaintext, &key).unwrap();
        assert_ne!(&encrypted[NONCE_SIZE..], plaintext.as_slice());

        let decrypted = decrypt(&encrypted, &key).unwrap();
        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = generate_key().unwrap();

        let encrypted = encrypt(b"", &key).unwrap();
        assert_eq!(encrypted.len(), NONCE_SIZE + TAG_SIZE);
        assert_eq!(decrypt(&encrypted, &key).unwrap(), b"");
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let key1 = Key::from_bytes([1u8; KEY_SIZE]);
        let key2 = Key::from_bytes([2u8; KEY_SIZE]);

        let encrypted = encrypt(b"secret data", &key1).unwrap();
        let err = decrypt(&encrypted, &key2).unwrap_err();

        assert!(matches!(err, SealError::AuthenticationFailed));
    }

    #[test]
    fn test_encrypted_size() {
        let key = generate_key().unwrap();
        let plaintext = vec![0u8; 1000];

        let encrypted = encrypt(&plaintext, &key).unwrap();

        // nonce (12) + plaintext (1000) + tag (16) = 1028
        assert_eq!(encrypted.len(), 12 + 1000 + 16);
    }

    #[test]
    fn test_tampered_ciphertext() {
        let key = generate_key().unwrap();

        let mut encrypted = encrypt(b"secret data", &key).unwrap();
        // Flip a byte in the ciphertext (after nonce)
        encrypted[NONCE_SIZE + 1] ^= 0xFF;

        let err = decrypt(&encrypted, &key).unwrap_err();
        assert!(matches!(err, SealError::AuthenticationFailed));
    }

    #[test]
    fn test_tampered_nonce() {
        let key = generate_key().unwrap();

        let mut encrypted = encrypt(b"secret data", &key).unwrap();
        encrypted[0] ^= 0x01;

        assert!(matches!(
            decrypt(&encrypted, &key),
            Err(SealError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_short_envelope_is_malformed() {
        let key = generate_key().unwrap();
        for len in 0..NONCE_SIZE {
            let err = decrypt(&vec![0u8; len], &key).unwrap_err();
            assert!(
                matches!(err, SealError::MalformedEnvelope { len: l } if l == len),
                "len {len} should be malformed, got {err:?}"
            );
        }
    }

    #[test]
    fn test_nonce_only_envelope_fails_authentication() {
        let key = generate_key().unwrap();
        let err = decrypt(&[0u8; NONCE_SIZE], &key).unwrap_err();
        assert!(matches!(err, SealError::AuthenticationFailed));
    }

    #[test]
    fn test_nonce_freshness() {
        let key = generate_key().unwrap();
        let plaintext = b"same plaintext every time";

        let outputs: HashSet<Vec<u8>> = (0..1000)
            .map(|_| encrypt(plaintext, &key).unwrap())
            .collect();
        assert_eq!(outputs.len(), 1000, "every envelope must be unique");

        let nonces: HashSet<Vec<u8>> = outputs.iter().map(|e| e[..NONCE_SIZE].to_vec()).collect();
        assert_eq!(nonces.len(), 1000, "every nonce must be unique");
    }

    proptest! {
        #[test]
        fn roundtrip_any_payload(
            data in proptest::collection::vec(any::<u8>(), 0..=8192),
            key_bytes in any::<[u8; KEY_SIZE]>(),
        ) {
            let key = Key::from_bytes(key_bytes);
            let envelope = encrypt(&data, &key).unwrap();
            prop_assert_eq!(envelope.len(), NONCE_SIZE + data.len() + TAG_SIZE);
            prop_assert_eq!(decrypt(&envelope, &key).unwrap(), data);
        }

        #[test]
        fn other_key_never_authenticates(
            data in proptest::collection::vec(any::<u8>(), 0..=1024),
            k1 in any::<[u8; KEY_SIZE]>(),
            k2 in any::<[u8; KEY_SIZE]>(),
        ) {
            prop_assume!(k1 != k2);
            let envelope = encrypt(&data, &Key::from_bytes(k1)).unwrap();
            let result = decrypt(&envelope, &Key::from_bytes(k2));
            prop_assert!(matches!(result, Err(SealError::AuthenticationFailed)));
        }
    }
}
