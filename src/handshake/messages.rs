//! KEX and SIG message wire formats (§4.3).

use crate::core::{ECDH_SIZE, KEX_MESSAGE_SIZE, KEX_NONCE_SIZE, KEX_VERSION, ProtocolViolation, SptpsError};

/// `[version:u8=0][preferred_suite:u8][suite_mask:u16 LE][nonce:32][ephemeral_pub:ECDH_SIZE]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KexMessage {
    /// Always [`KEX_VERSION`] on the wire; kept as a field so decoding a
    /// future version can still be reported precisely.
    pub version: u8,
    /// This side's preferred cipher suite id.
    pub preferred_suite: u8,
    /// This side's enabled-suite bitmap.
    pub suite_mask: u16,
    /// A fresh 32 random bytes, fed into the PRF seed.
    pub nonce: [u8; KEX_NONCE_SIZE],
    /// This side's ephemeral X25519 public key.
    pub ephemeral_pub: [u8; ECDH_SIZE],
}

impl KexMessage {
    /// Encode to the fixed-size wire representation. This is also exactly
    /// the `initiator_kex`/`responder_kex` byte string used in the SIG
    /// verification input.
    pub fn encode(&self) -> [u8; KEX_MESSAGE_SIZE] {
        let mut buf = [0u8; KEX_MESSAGE_SIZE];
        buf[0] = self.version;
        buf[1] = self.preferred_suite;
        buf[2..4].copy_from_slice(&self.suite_mask.to_le_bytes());
        buf[4..4 + KEX_NONCE_SIZE].copy_from_slice(&self.nonce);
        buf[4 + KEX_NONCE_SIZE..].copy_from_slice(&self.ephemeral_pub);
        buf
    }

    /// Decode a KEX message body, validating length and version.
    pub fn decode(bytes: &[u8]) -> Result<Self, SptpsError> {
        if bytes.len() != KEX_MESSAGE_SIZE {
            return Err(ProtocolViolation::WrongLength {
                expected: KEX_MESSAGE_SIZE,
                actual: bytes.len(),
            }
            .into());
        }
        let version = bytes[0];
        if version != KEX_VERSION {
            return Err(ProtocolViolation::UnknownVersion(version).into());
        }
        let preferred_suite = bytes[1];
        let suite_mask = u16::from_le_bytes([bytes[2], bytes[3]]);
        let mut nonce = [0u8; KEX_NONCE_SIZE];
        nonce.copy_from_slice(&bytes[4..4 + KEX_NONCE_SIZE]);
        let mut ephemeral_pub = [0u8; ECDH_SIZE];
        ephemeral_pub.copy_from_slice(&bytes[4 + KEX_NONCE_SIZE..]);
        Ok(Self {
            version,
            preferred_suite,
            suite_mask,
            nonce,
            ephemeral_pub,
        })
    }
}

/// Build the SIG verification input:
/// `[originator_flag:u8][initiator_kex][responder_kex][label]`.
///
/// `originator` is `true` when building/verifying the initiator's own
/// signature; a verifier checking the peer's signature passes
/// `originator = !own_role_is_initiator`.
pub fn sig_input(
    originator: bool,
    initiator_kex: &[u8; KEX_MESSAGE_SIZE],
    responder_kex: &[u8; KEX_MESSAGE_SIZE],
    label: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + 2 * KEX_MESSAGE_SIZE + label.len());
    buf.push(u8::from(originator));
    buf.extend_from_slice(initiator_kex);
    buf.extend_from_slice(responder_kex);
    buf.extend_from_slice(label);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> KexMessage {
        KexMessage {
            version: KEX_VERSION,
            preferred_suite: 0,
            suite_mask: 0xffff,
            nonce: [7u8; KEX_NONCE_SIZE],
            ephemeral_pub: [8u8; ECDH_SIZE],
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let msg = sample();
        let decoded = KexMessage::decode(&msg.encode()).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(KexMessage::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn rejects_unknown_version() {
        let mut wire = sample().encode();
        wire[0] = 1;
        assert!(matches!(
            KexMessage::decode(&wire),
            Err(SptpsError::ProtocolViolation(ProtocolViolation::UnknownVersion(1)))
        ));
    }

    #[test]
    fn sig_input_differs_by_originator_flag() {
        let a = sample().encode();
        let b = sample().encode();
        let initiator_input = sig_input(true, &a, &b, b"label");
        let responder_input = sig_input(false, &a, &b, b"label");
        assert_ne!(initiator_input, responder_input);
        assert_eq!(initiator_input[0], 1);
        assert_eq!(responder_input[0], 0);
    }
}
