//! Handshake state machine types (§4.3). The transition logic itself lives
//! on [`crate::Session`], since every transition reads and writes session
//! state (cipher contexts, negotiated suite, key material).

mod messages;

pub use messages::{KexMessage, sig_input};

/// Handshake state. `SecondaryKex` doubles as the established/idle state,
/// matching the reference's reuse of one state for both renegotiation
/// readiness and steady-state operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Waiting for the peer's KEX.
    Kex,
    /// Waiting for the peer's SIG.
    Sig,
    /// Waiting for the peer's ACK (only reached when `outstate` was
    /// already true before this handshake, i.e. a renegotiation).
    Ack,
    /// Established; also the state from which `force_kex` is permitted.
    SecondaryKex,
}

impl HandshakeState {
    /// A short name for error messages and logging.
    pub const fn name(self) -> &'static str {
        match self {
            HandshakeState::Kex => "KEX",
            HandshakeState::Sig => "SIG",
            HandshakeState::Ack => "ACK",
            HandshakeState::SecondaryKex => "SECONDARY_KEX",
        }
    }
}
