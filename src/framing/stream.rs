//! Stream framing (§4.1):
//! `[len:u16 LE][type:u8][payload:len bytes][tag:16 bytes if encrypted]`.
//!
//! These are stateless encode/decode primitives; the accumulate-until-full
//! reassembly loop lives in [`crate::Session`], since it needs the
//! session's running inbound sequence number to pick the AEAD nonce.

use crate::core::{AEAD_TAG_SIZE, ProtocolViolation, SptpsError};
use crate::crypto::CipherContext;

/// Frame one record. `cipher` is `Some((ctx, seqno))` once `outstate` is
/// true; `None` during the plaintext portion of the handshake.
pub fn encode(record_type: u8, payload: &[u8], cipher: Option<(&CipherContext, u32)>) -> Vec<u8> {
    let mut plaintext = Vec::with_capacity(1 + payload.len());
    plaintext.push(record_type);
    plaintext.extend_from_slice(payload);

    let body = match cipher {
        Some((ctx, seqno)) => ctx.encrypt(seqno, &plaintext),
        None => plaintext,
    };

    let mut wire = Vec::with_capacity(2 + body.len());
    wire.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    wire.extend_from_slice(&body);
    wire
}

/// Parse the 2-byte length prefix. `header` must be at least 2 bytes.
pub fn declared_payload_len(header: &[u8]) -> u16 {
    u16::from_le_bytes([header[0], header[1]])
}

/// Number of bytes that must follow the length prefix for a record whose
/// declared payload length is `payload_len`.
pub fn body_size(payload_len: u16, encrypted: bool) -> usize {
    1 + payload_len as usize + if encrypted { AEAD_TAG_SIZE } else { 0 }
}

/// Decode the bytes following the length prefix (`type ‖ payload [‖ tag]`)
/// into `(record_type, payload)`.
pub fn decode(body: &[u8], cipher: Option<(&CipherContext, u32)>) -> Result<(u8, Vec<u8>), SptpsError> {
    let plaintext = match cipher {
        Some((ctx, seqno)) => ctx.decrypt(seqno, body)?,
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
    Ok((record_type, payload))
}
