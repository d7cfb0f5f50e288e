//! Long-term (Ed25519) and ephemeral (X25519) keypairs.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use x25519_dalek::{EphemeralSecret, PublicKey as XPublicKey};
use zeroize::Zeroize;

use crate::core::{CryptoFailure, ECDH_SIZE, SIGNING_KEY_SIZE, SptpsError};

/// A long-term Ed25519 identity keypair, borrowed by the session for its
/// whole lifetime per §5 (the session never owns these).
pub struct LongTermKeypair {
    signing: SigningKey,
}

impl LongTermKeypair {
    /// Generate a new random long-term keypair.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Reconstruct a keypair from a 32-byte Ed25519 seed.
    pub fn from_bytes(seed: &[u8; SIGNING_KEY_SIZE]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    /// The public key, as sent to and verified against by the peer.
    pub fn public_key(&self) -> [u8; SIGNING_KEY_SIZE] {
        self.signing.verifying_key().to_bytes()
    }

    /// The 32-byte seed this keypair was generated or reconstructed from,
    /// for callers that need to persist an identity (e.g. a key-generation
    /// tool). The session itself never calls this.
    pub fn to_bytes(&self) -> [u8; SIGNING_KEY_SIZE] {
        self.signing.to_bytes()
    }

    /// Sign `message` under the long-term private key.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl Drop for LongTermKeypair {
    fn drop(&mut self) {
        // SigningKey zeroizes its own scalar bytes on drop.
    }
}

/// Verify a `sig` over `message` under `peer_public_key`.
pub fn verify(
    peer_public_key: &[u8; SIGNING_KEY_SIZE],
    message: &[u8],
    sig: &[u8; 64],
) -> Result<(), SptpsError> {
    let key = VerifyingKey::from_bytes(peer_public_key)
        .map_err(|_| SptpsError::CryptoFailure(CryptoFailure::SignatureVerifyFailed))?;
    let signature = Signature::from_bytes(sig);
    key.verify(message, &signature)
        .map_err(|_| SptpsError::CryptoFailure(CryptoFailure::SignatureVerifyFailed))
}

/// `ecdsa_size(peer_key)`. Fixed at 64 bytes for the one signing algorithm
/// this implementation supports; kept as a function rather than inlining
/// the constant so a future signing algorithm could vary it per key.
pub const fn ecdsa_size(_peer_key: &[u8; SIGNING_KEY_SIZE]) -> usize {
    64
}

/// An ephemeral X25519 keypair, generated fresh per handshake and
/// destroyed immediately after the shared secret is computed (§3).
pub struct EphemeralKeypair {
    secret: Option<EphemeralSecret>,
    public: [u8; ECDH_SIZE],
}

impl EphemeralKeypair {
    /// Generate a new random ephemeral keypair.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = XPublicKey::from(&secret);
        Self {
            secret: Some(secret),
            public: public.to_bytes(),
        }
    }

    /// The public share, sent in the KEX message.
    pub fn public_key(&self) -> [u8; ECDH_SIZE] {
        self.public
    }

    /// Compute the shared secret with the peer's ephemeral public key and
    /// consume this keypair's private share; it cannot be reused.
    ///
    /// Returns [`CryptoFailure::EcdhFailed`] if called twice.
    pub fn diffie_hellman(&mut self, peer_public: &[u8; ECDH_SIZE]) -> Result<[u8; 32], SptpsError> {
        let secret = self
            .secret
            .take()
            .ok_or(SptpsError::CryptoFailure(CryptoFailure::EcdhFailed))?;
        let peer = XPublicKey::from(*peer_public);
        Ok(*secret.diffie_hellman(&peer).as_bytes())
    }
}

impl Drop for EphemeralKeypair {
    fn drop(&mut self) {
        self.public.zeroize();
        // `EphemeralSecret` zeroizes its own scalar bytes on drop; dropping
        // the `Option` here drops it if still present.
    }
}
