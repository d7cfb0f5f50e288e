//! Error types.

use thiserror::Error;

/// The five error kinds a session can surface, matching the categories a
/// caller needs to branch on without string-matching.
#[derive(Debug, Error)]
pub enum SptpsError {
    /// Wrong record length, unexpected handshake state, unknown KEX
    /// version, no common cipher suite, or an unknown record type.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),

    /// AEAD verification, signature verification, ECDH, or PRF failure.
    #[error("crypto failure: {0}")]
    CryptoFailure(#[from] CryptoFailure),

    /// Sequence number outside the replay window, or already observed.
    #[error("replay drop: seqno {seqno} ({reason})")]
    ReplayDrop {
        /// The sequence number that was rejected.
        seqno: u32,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Allocation failure growing an internal buffer.
    #[error("resource failure: {0}")]
    ResourceFailure(&'static str),

    /// Caller misuse: `send_record` before handshake completion, an
    /// invalid application record type, or `force_kex` from the wrong
    /// state.
    #[error("misuse: {0}")]
    MisuseError(&'static str),
}

/// Sub-kinds of [`SptpsError::ProtocolViolation`].
#[derive(Debug, Error)]
pub enum ProtocolViolation {
    /// A framed record's declared length did not match what was read.
    #[error("wrong record length: expected {expected}, got {actual}")]
    WrongLength {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// A handshake record arrived while the session was in a state that
    /// does not expect it.
    #[error("unexpected handshake record in state {state}")]
    UnexpectedState {
        /// The state the session was in.
        state: &'static str,
    },

    /// The KEX message's version field did not match [`crate::KEX_VERSION`].
    #[error("unknown KEX version: {0}")]
    UnknownVersion(u8),

    /// Cipher suite negotiation found no bit set in both masks.
    #[error("no common cipher suite")]
    NoCommonSuite,

    /// A record type byte did not correspond to a known record kind.
    #[error("unknown record type: {0}")]
    UnknownRecordType(u8),
}

/// Sub-kinds of [`SptpsError::CryptoFailure`].
#[derive(Debug, Error)]
pub enum CryptoFailure {
    /// AEAD tag verification failed on decryption.
    #[error("AEAD verification failed")]
    AeadVerifyFailed,

    /// The peer's SIG record did not verify under its long-term key.
    #[error("signature verification failed")]
    SignatureVerifyFailed,

    /// ECDH shared-secret computation failed.
    #[error("ECDH computation failed")]
    EcdhFailed,

    /// An AEAD cipher rejected its (correctly-sized) key at construction.
    #[error("cipher key initialization failed")]
    KeyInitFailed,

    /// The PRF failed to produce the requested amount of key material.
    #[error("PRF failed")]
    PrfFailed,
}

impl SptpsError {
    /// A short, stable tag naming the error kind, useful for logging
    /// without formatting the full display string.
    pub fn kind(&self) -> &'static str {
        match self {
            SptpsError::ProtocolViolation(_) => "protocol_violation",
            SptpsError::CryptoFailure(_) => "crypto_failure",
            SptpsError::ReplayDrop { .. } => "replay_drop",
            SptpsError::ResourceFailure(_) => "resource_failure",
            SptpsError::MisuseError(_) => "misuse_error",
        }
    }
}
