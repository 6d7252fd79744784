// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AES-256-GCM sealing of share payloads.
//!
//! A fresh 96-bit nonce is drawn for every seal. The nonce is stored next to
//! the ciphertext (it is not secret); the GCM tag is appended to the
//! ciphertext by `ring`. Opening either yields the whole plaintext or fails
//! with [`CipherError::Authentication`]; there is no partial output.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

/// Required key length in bytes.
pub const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("encryption key must be {KEY_LEN} bytes (64 hex chars), got {0} bytes")]
    InvalidKeyLength(usize),

    #[error("encryption key is not valid hex")]
    InvalidKeyEncoding,

    #[error("system random source unavailable")]
    RandomUnavailable,

    #[error("payload sealing failed")]
    Seal,

    #[error("payload failed authentication")]
    Authentication,
}

/// The deployment's static 32-byte payload key.
///
/// Parsed once at startup and handed to [`ContentCipher`]; never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CipherError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(key))
    }

    /// Parse a hex-encoded key (surrounding whitespace ignored).
    pub fn from_hex(encoded: &str) -> Result<Self, CipherError> {
        let bytes = hex::decode(encoded.trim()).map_err(|_| CipherError::InvalidKeyEncoding)?;
        Self::from_bytes(&bytes)
    }

    fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

/// Ciphertext (with appended GCM tag) and the nonce it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
}

/// Authenticated encryption of share payloads under a single static key.
pub struct ContentCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl ContentCipher {
    pub fn new(key: &EncryptionKey) -> Result<Self, CipherError> {
        let unbound = UnboundKey::new(&AES_256_GCM, key.as_bytes())
            .map_err(|_| CipherError::InvalidKeyLength(KEY_LEN))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Seal `plaintext` under a freshly drawn nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<SealedPayload, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CipherError::RandomUnavailable)?;

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| CipherError::Seal)?;

        Ok(SealedPayload {
            ciphertext: in_out,
            nonce: nonce_bytes.to_vec(),
        })
    }

    /// Open a sealed payload. Any tampering, wrong key or malformed nonce
    /// surfaces as [`CipherError::Authentication`].
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>, CipherError> {
        let nonce =
            Nonce::try_assume_unique_for_key(nonce).map_err(|_| CipherError::Authentication)?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CipherError::Authentication)?;
        Ok(plaintext.to_vec())
    }
}

impl std::fmt::Debug for ContentCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> EncryptionKey {
        EncryptionKey::from_bytes(&[byte; KEY_LEN]).unwrap()
    }

    #[test]
    fn encrypt_then_decrypt_returns_plaintext() {
        let cipher = ContentCipher::new(&key(7)).unwrap();
        for plaintext in [&b""[..], b"hunter2", &[0xffu8; 4096][..]] {
            let sealed = cipher.encrypt(plaintext).unwrap();
            assert_eq!(sealed.nonce.len(), NONCE_LEN);
            assert_eq!(cipher.decrypt(&sealed.ciphertext, &sealed.nonce).unwrap(), plaintext);
        }
    }

    #[test]
    fn every_seal_uses_a_fresh_nonce() {
        let cipher = ContentCipher::new(&key(1)).unwrap();
        let a = cipher.encrypt(b"same").unwrap();
        let b = cipher.encrypt(b"same").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn flipping_any_ciphertext_bit_fails_authentication() {
        let cipher = ContentCipher::new(&key(3)).unwrap();
        let sealed = cipher.encrypt(b"top secret").unwrap();

        for byte in 0..sealed.ciphertext.len() {
            for bit in 0..8 {
                let mut tampered = sealed.ciphertext.clone();
                tampered[byte] ^= 1 << bit;
                assert_eq!(
                    cipher.decrypt(&tampered, &sealed.nonce),
                    Err(CipherError::Authentication)
                );
            }
        }
    }

    #[test]
    fn flipping_any_nonce_bit_fails_authentication() {
        let cipher = ContentCipher::new(&key(3)).unwrap();
        let sealed = cipher.encrypt(b"top secret").unwrap();

        for byte in 0..sealed.nonce.len() {
            for bit in 0..8 {
                let mut tampered = sealed.nonce.clone();
                tampered[byte] ^= 1 << bit;
                assert_eq!(
                    cipher.decrypt(&sealed.ciphertext, &tampered),
                    Err(CipherError::Authentication)
                );
            }
        }
    }

    #[test]
    fn wrong_key_or_short_nonce_fails_authentication() {
        let sealed = ContentCipher::new(&key(1)).unwrap().encrypt(b"x").unwrap();
        let other = ContentCipher::new(&key(2)).unwrap();
        assert_eq!(
            other.decrypt(&sealed.ciphertext, &sealed.nonce),
            Err(CipherError::Authentication)
        );
        assert_eq!(
            other.decrypt(&sealed.ciphertext, &sealed.nonce[..8]),
            Err(CipherError::Authentication)
        );
    }

    #[test]
    fn key_parsing_enforces_length_and_hex() {
        assert!(EncryptionKey::from_hex(&"ab".repeat(32)).is_ok());
        assert_eq!(
            EncryptionKey::from_hex(&"ab".repeat(16)),
            Err(CipherError::InvalidKeyLength(16))
        );
        assert_eq!(
            EncryptionKey::from_hex("not-hex"),
            Err(CipherError::InvalidKeyEncoding)
        );
    }

    #[test]
    fn key_debug_is_redacted() {
        assert_eq!(format!("{:?}", key(9)), "EncryptionKey(<redacted>)");
    }
}
