//! AEAD cipher abstraction (§4.2): a tagged enum over the two supported
//! backends rather than a trait object, per the "tagged variant" redesign
//! flag in the design notes.

use chacha20poly1305::ChaCha20Poly1305;
use chacha20poly1305::aead::{Aead, KeyInit, generic_array::GenericArray};
#[cfg(feature = "aes-gcm-suite")]
use aes_gcm::Aes256Gcm;
use zeroize::Zeroize;

use crate::core::{AEAD_KEY_SIZE, AEAD_NONCE_SIZE, CryptoFailure, SptpsError};
use super::suite::{AES_256_GCM, CHACHA20_POLY1305, CipherSuite};

/// One direction's live AEAD state.
pub enum CipherContext {
    /// ChaCha20-Poly1305.
    ChaCha20Poly1305(Box<ChaCha20Poly1305>),
    /// AES-256-GCM.
    #[cfg(feature = "aes-gcm-suite")]
    Aes256Gcm(Box<Aes256Gcm>),
}

fn nonce_bytes(seqno: u32) -> [u8; AEAD_NONCE_SIZE] {
    let mut nonce = [0u8; AEAD_NONCE_SIZE];
    nonce[..4].copy_from_slice(&seqno.to_le_bytes());
    nonce
}

impl CipherContext {
    /// Initialize a cipher context from a 32-byte key (the first 32 bytes
    /// of the relevant 64-byte half of the derived key material).
    pub fn init(suite: CipherSuite, mut key: [u8; AEAD_KEY_SIZE]) -> Result<Self, SptpsError> {
        let ctx = match suite.0 {
            CHACHA20_POLY1305 => {
                CipherContext::ChaCha20Poly1305(Box::new(ChaCha20Poly1305::new_from_slice(&key)
                    .map_err(|_| SptpsError::CryptoFailure(CryptoFailure::KeyInitFailed))?))
            }
            #[cfg(feature = "aes-gcm-suite")]
            AES_256_GCM => {
                CipherContext::Aes256Gcm(Box::new(Aes256Gcm::new_from_slice(&key)
                    .map_err(|_| SptpsError::CryptoFailure(CryptoFailure::KeyInitFailed))?))
            }
            #[cfg(not(feature = "aes-gcm-suite"))]
            AES_256_GCM => {
                return Err(SptpsError::ProtocolViolation(
                    crate::core::ProtocolViolation::NoCommonSuite,
                ));
            }
            _ => {
                return Err(SptpsError::ProtocolViolation(
                    crate::core::ProtocolViolation::NoCommonSuite,
                ));
            }
        };
        key.zeroize();
        Ok(ctx)
    }

    /// Encrypt `plaintext` under `seqno`, returning `ciphertext ‖ tag`.
    /// No associated data is used (see the AEAD glossary entry).
    pub fn encrypt(&self, seqno: u32, plaintext: &[u8]) -> Vec<u8> {
        let nonce = nonce_bytes(seqno);
        match self {
            CipherContext::ChaCha20Poly1305(c) => c
                .encrypt(GenericArray::from_slice(&nonce), plaintext)
                .expect("ChaCha20-Poly1305 encryption is infallible for in-range inputs"),
            #[cfg(feature = "aes-gcm-suite")]
            CipherContext::Aes256Gcm(c) => c
                .encrypt(GenericArray::from_slice(&nonce), plaintext)
                .expect("AES-256-GCM encryption is infallible for in-range inputs"),
        }
    }

    /// Decrypt `ciphertext ‖ tag` under `seqno`. Surfaces AEAD verification
    /// failure as [`CryptoFailure::AeadVerifyFailed`]; never retried.
    pub fn decrypt(&self, seqno: u32, ciphertext: &[u8]) -> Result<Vec<u8>, SptpsError> {
        let nonce = nonce_bytes(seqno);
        let result = match self {
            CipherContext::ChaCha20Poly1305(c) => {
                c.decrypt(GenericArray::from_slice(&nonce), ciphertext)
            }
            #[cfg(feature = "aes-gcm-suite")]
            CipherContext::Aes256Gcm(c) => {
                c.decrypt(GenericArray::from_slice(&nonce), ciphertext)
            }
        };
        result.map_err(|_| SptpsError::CryptoFailure(CryptoFailure::AeadVerifyFailed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::suite::CipherSuite;

    fn key(byte: u8) -> [u8; AEAD_KEY_SIZE] {
        [byte; AEAD_KEY_SIZE]
    }

    #[test]
    fn chacha20_roundtrip() {
        let ctx = CipherContext::init(CipherSuite(CHACHA20_POLY1305), key(1)).unwrap();
        let ct = ctx.encrypt(0, b"hello\n");
        let pt = ctx.decrypt(0, &ct).unwrap();
        assert_eq!(pt, b"hello\n");
    }

    #[test]
    fn chacha20_rejects_tampered_ciphertext() {
        let ctx = CipherContext::init(CipherSuite(CHACHA20_POLY1305), key(1)).unwrap();
        let mut ct = ctx.encrypt(0, b"hello\n");
        ct[0] ^= 0xff;
        assert!(ctx.decrypt(0, &ct).is_err());
    }

    #[test]
    fn chacha20_rejects_wrong_seqno() {
        let ctx = CipherContext::init(CipherSuite(CHACHA20_POLY1305), key(1)).unwrap();
        let ct = ctx.encrypt(5, b"hello\n");
        assert!(ctx.decrypt(6, &ct).is_err());
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let ctx = CipherContext::init(CipherSuite(CHACHA20_POLY1305), key(9)).unwrap();
        let ct = ctx.encrypt(0, b"");
        let pt = ctx.decrypt(0, &ct).unwrap();
        assert!(pt.is_empty());
    }

    #[cfg(feature = "aes-gcm-suite")]
    #[test]
    fn aes_gcm_roundtrip() {
        let ctx = CipherContext::init(CipherSuite(AES_256_GCM), key(3)).unwrap();
        let ct = ctx.encrypt(1, b"world\n");
        let pt = ctx.decrypt(1, &ct).unwrap();
        assert_eq!(pt, b"world\n");
    }
}
