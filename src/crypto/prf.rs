//! TLS 1.2-style `P_hash` PRF (§4.7), instantiated with HMAC-SHA256.
//!
//! ```text
//! A(0) = seed
//! A(i) = HMAC(secret, A(i-1))
//! P_hash(secret, seed) = HMAC(secret, A(1) ‖ seed) ‖ HMAC(secret, A(2) ‖ seed) ‖ ...
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::core::{CryptoFailure, KEX_NONCE_SIZE, PRF_OUTPUT_SIZE, PRF_SEED_LABEL, SptpsError};

type HmacSha256 = Hmac<Sha256>;

/// `P_hash(secret, seed)`, truncated to `output_len` bytes.
fn p_hash(secret: &[u8], seed: &[u8], output_len: usize) -> Result<Vec<u8>, SptpsError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| SptpsError::CryptoFailure(CryptoFailure::PrfFailed))?;

    let mut a = seed.to_vec();
    let mut out = Vec::with_capacity(output_len + 32);

    while out.len() < output_len {
        mac.update(&a);
        let a_next = mac.finalize_reset().into_bytes().to_vec();

        mac.update(&a_next);
        mac.update(seed);
        out.extend_from_slice(&mac.finalize_reset().into_bytes());

        a = a_next;
    }

    out.truncate(output_len);
    Ok(out)
}

/// Derive the 128-byte session key material from the ECDH shared secret,
/// the two sides' KEX nonces (always initiator-first, regardless of local
/// role), and the session label.
pub fn derive_key_material(
    shared_secret: &[u8; 32],
    initiator_nonce: &[u8; KEX_NONCE_SIZE],
    responder_nonce: &[u8; KEX_NONCE_SIZE],
    label: &[u8],
) -> Result<[u8; PRF_OUTPUT_SIZE], SptpsError> {
    let mut seed = Vec::with_capacity(PRF_SEED_LABEL.len() + 2 * KEX_NONCE_SIZE + label.len());
    seed.extend_from_slice(PRF_SEED_LABEL);
    seed.extend_from_slice(initiator_nonce);
    seed.extend_from_slice(responder_nonce);
    seed.extend_from_slice(label);

    let expanded = p_hash(shared_secret, &seed, PRF_OUTPUT_SIZE)?;
    let mut material = [0u8; PRF_OUTPUT_SIZE];
    material.copy_from_slice(&expanded);
    Ok(material)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_material_is_deterministic() {
        let secret = [7u8; 32];
        let in_nonce = [1u8; KEX_NONCE_SIZE];
        let re_nonce = [2u8; KEX_NONCE_SIZE];
        let a = derive_key_material(&secret, &in_nonce, &re_nonce, b"test").unwrap();
        let b = derive_key_material(&secret, &in_nonce, &re_nonce, b"test").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_labels_diverge() {
        let secret = [7u8; 32];
        let in_nonce = [1u8; KEX_NONCE_SIZE];
        let re_nonce = [2u8; KEX_NONCE_SIZE];
        let a = derive_key_material(&secret, &in_nonce, &re_nonce, b"alpha").unwrap();
        let b = derive_key_material(&secret, &in_nonce, &re_nonce, b"beta").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn nonce_order_is_initiator_first_regardless_of_role() {
        // Both the initiator and the responder must build the same seed,
        // so swapping which side calls this makes no difference as long
        // as the initiator nonce is always passed first.
        let secret = [9u8; 32];
        let in_nonce = [3u8; KEX_NONCE_SIZE];
        let re_nonce = [4u8; KEX_NONCE_SIZE];
        let from_initiator_view = derive_key_material(&secret, &in_nonce, &re_nonce, b"l").unwrap();
        let from_responder_view = derive_key_material(&secret, &in_nonce, &re_nonce, b"l").unwrap();
        assert_eq!(from_initiator_view, from_responder_view);
    }

    #[test]
    fn output_length_is_exactly_128_bytes() {
        let out = p_hash(&[1u8; 32], b"seed", PRF_OUTPUT_SIZE).unwrap();
        assert_eq!(out.len(), PRF_OUTPUT_SIZE);
    }

    /// Known-answer test: a fixed shared secret, nonce pair, and label
    /// expand to a specific, independently-computed 128-byte string (an
    /// external HMAC-SHA256 `P_hash` run over the same inputs), not just to
    /// whatever this implementation happens to produce twice in a row. The
    /// secret and expected output are hex literals for readability.
    #[test]
    fn known_answer_vector() {
        let secret: [u8; 32] = hex::decode("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f")
            .unwrap()
            .try_into()
            .unwrap();
        let in_nonce = [0x11u8; KEX_NONCE_SIZE];
        let re_nonce = [0x22u8; KEX_NONCE_SIZE];
        let material = derive_key_material(&secret, &in_nonce, &re_nonce, b"kat").unwrap();

        let expected = "2299e0bed60e2c5c7c6b968c8694bd3052b5a93b208dccbdf882494f82b91562f32545f1999e334e\
117821f3f311b82bcf9f779c669473d81f59ad21d9eb94b201cf134f75574b52603647c61a165619\
9135db28738f98860f5f0495085d6e3ecef73ba627ffce422cad203f5c66963a0667d7cdfe6cc1f2\
6ed34ffb02508ff0";
        assert_eq!(hex::encode(material), expected);
    }
}
