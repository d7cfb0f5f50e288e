//! Protocol constants.
//!
//! These values are fixed by the wire format and MUST NOT be changed.

// =============================================================================
// CRYPTOGRAPHIC SIZES (§4.2, §4.3)
// =============================================================================

/// AEAD authentication tag size, both supported suites.
pub const AEAD_TAG_SIZE: usize = 16;

/// AEAD nonce size: the 4-byte little-endian sequence number, zero-padded.
pub const AEAD_NONCE_SIZE: usize = 12;

/// AEAD key size, both supported suites.
pub const AEAD_KEY_SIZE: usize = 32;

/// X25519 public key size (`ECDH_SIZE`).
pub const ECDH_SIZE: usize = 32;

/// Ed25519 public key size.
pub const SIGNING_KEY_SIZE: usize = 32;

/// Ed25519 signature size. `ecdsa_size(peer_key)` always returns this for
/// the one signing algorithm this implementation supports; the function is
/// kept distinct from the constant so a future signing algorithm could be
/// swapped in without touching the handshake driver.
pub const ECDSA_SIZE: usize = 64;

/// KEX nonce size.
pub const KEX_NONCE_SIZE: usize = 32;

/// Size of the derived key material (two 64-byte halves).
pub const KEY_MATERIAL_SIZE: usize = 128;

/// Size of one direction's half of the derived key material.
pub const KEY_MATERIAL_HALF_SIZE: usize = 64;

// =============================================================================
// HANDSHAKE PROTOCOL
// =============================================================================

/// The only KEX wire version this implementation speaks.
pub const KEX_VERSION: u8 = 0;

/// KEX message wire size: version(1) + preferred_suite(1) + suite_mask(2) +
/// nonce(32) + ephemeral_pub(ECDH_SIZE).
pub const KEX_MESSAGE_SIZE: usize = 1 + 1 + 2 + KEX_NONCE_SIZE + ECDH_SIZE;

/// The `"key expansion"` seed label prefix used by the PRF (§4.7).
pub const PRF_SEED_LABEL: &[u8] = b"key expansion";

/// Output length of the PRF.
pub const PRF_OUTPUT_SIZE: usize = KEY_MATERIAL_SIZE;

// =============================================================================
// RECORD TYPES (§4.1)
// =============================================================================

/// Application record types occupy `0..128`; `HANDSHAKE` is the only
/// protocol-reserved type.
pub const HANDSHAKE_RECORD_TYPE: u8 = 128;

/// Returns whether a record type is an application (non-handshake) type.
pub const fn is_application_record(record_type: u8) -> bool {
    record_type < HANDSHAKE_RECORD_TYPE
}

// =============================================================================
// FRAMING OVERHEADS (§4.1)
// =============================================================================

/// Stream framing header: `len:u16 + type:u8`.
pub const STREAM_HEADER_SIZE: usize = 3;

/// Stream framing overhead once encrypted: header + tag.
pub const STREAM_OVERHEAD: usize = STREAM_HEADER_SIZE + AEAD_TAG_SIZE;

/// Datagram framing header: `seqno:u32 + type:u8`.
pub const DATAGRAM_HEADER_SIZE: usize = 5;

/// Datagram framing overhead once encrypted: header + tag.
pub const DATAGRAM_OVERHEAD: usize = DATAGRAM_HEADER_SIZE + AEAD_TAG_SIZE;

/// Minimum plaintext (handshake, pre-cipher) datagram size: header + type.
pub const DATAGRAM_MIN_PLAINTEXT_SIZE: usize = DATAGRAM_HEADER_SIZE;

// =============================================================================
// REPLAY WINDOW (§4.5)
// =============================================================================

/// Default replay window size in bytes (128 slots). `0` disables replay
/// protection.
pub const DEFAULT_REPLAY_WINDOW_BYTES: usize = 16;

// =============================================================================
// REKEY ADVISORY (§9 expanded — non-protocol-visible)
// =============================================================================

/// `Session::should_rekey` starts returning `true` once either direction's
/// sequence number passes this threshold. Purely advisory: nothing in the
/// wire protocol enforces it, and no rekey happens automatically.
pub const REKEY_ADVISORY_SEQNO: u32 = 1 << 30;
