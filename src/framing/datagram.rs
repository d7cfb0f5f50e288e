//! Datagram framing (§4.1):
//! `[seqno:u32 LE][type:u8][payload:n bytes][tag:16 bytes if encrypted]`.
//!
//! The sequence number doubles as the AEAD nonce source and is transmitted
//! in the clear.

use crate::core::{DATAGRAM_MIN_PLAINTEXT_SIZE, DATAGRAM_OVERHEAD, ProtocolViolation, SptpsError};
use crate::crypto::CipherContext;

/// Frame one datagram. `cipher` is `None` only during the plaintext
/// portion of the handshake.
pub fn encode(seqno: u32, record_type: u8, payload: &[u8], cipher: Option<&CipherContext>) -> Vec<u8> {
    let mut plaintext = Vec::with_capacity(1 + payload.len());
    plaintext.push(record_type);
    plaintext.extend_from_slice(payload);

    let body = match cipher {
        Some(ctx) => ctx.encrypt(seqno, &plaintext),
        None => plaintext,
    };

    let mut wire = Vec::with_capacity(4 + body.len());
    wire.extend_from_slice(&seqno.to_le_bytes());
    wire.extend_from_slice(&body);
    wire
}

/// Decode a whole datagram into `(seqno, record_type, payload)`.
pub fn decode(datagram: &[u8], cipher: Option<&CipherContext>) -> Result<(u32, u8, Vec<u8>), SptpsError> {
    let min_len = if cipher.is_some() {
        DATAGRAM_OVERHEAD
    } else {
        DATAGRAM_MIN_PLAINTEXT_SIZE
    };
    if datagram.len() < min_len {
        return Err(SptpsError::ProtocolViolation(ProtocolViolation::WrongLength {
            expected: min_len,
            actual: datagram.len(),
        }));
    }

    let seqno = u32::from_le_bytes(datagram[0..4].try_into().unwrap());
    let body = &datagram[4..];
    let plaintext = match cipher {
        Some(ctx) => ctx.decrypt(seqno, body)?,
        None => body.to_vec(),
    };
    if plaintext.is_empty() {
        return Err(SptpsError::ProtocolViolation(ProtocolViolation::WrongLength {
            expected: 1,
            actual: 0,
        }));
    }
    let record_type = plaintext[0];
    let payload = plaintext[1..].to_vec();
    Ok((seqno, record_type, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CHACHA20_POLY1305, CipherSuite};

    fn test_cipher() -> CipherContext {
        CipherContext::init(CipherSuite(CHACHA20_POLY1305), [6u8; 32]).unwrap()
    }

    #[test]
    fn plaintext_roundtrip() {
        let wire = encode(0, 128, &[], None);
        assert_eq!(wire.len(), DATAGRAM_MIN_PLAINTEXT_SIZE);
        let (seqno, record_type, payload) = decode(&wire, None).unwrap();
        assert_eq!(seqno, 0);
        assert_eq!(record_type, 128);
        assert!(payload.is_empty());
    }

    #[test]
    fn encrypted_roundtrip() {
        let ctx = test_cipher();
        let wire = encode(42, 0, b"hello\n", Some(&ctx));
        let (seqno, record_type, payload) = decode(&wire, Some(&ctx)).unwrap();
        assert_eq!(seqno, 42);
        assert_eq!(record_type, 0);
        assert_eq!(payload, b"hello\n");
    }

    #[test]
    fn rejects_short_datagram() {
        let ctx = test_cipher();
        assert!(decode(&[0, 0, 0, 0], Some(&ctx)).is_err());
    }

    #[test]
    fn seqno_is_bound_into_the_nonce() {
        let ctx = test_cipher();
        let wire = encode(1, 0, b"hello\n", Some(&ctx));
        // Flip the cleartext sequence number: AEAD verification under the
        // wrong nonce must fail rather than silently decrypt.
        let mut tampered = wire.clone();
        tampered[0..4].copy_from_slice(&2u32.to_le_bytes());
        assert!(decode(&tampered, Some(&ctx)).is_err());
    }
}
