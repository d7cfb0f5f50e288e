//! # SPTPS — Simple Peer-to-Peer Security
//!
//! Authenticated, forward-secret, record-framed transport security for
//! peer-to-peer links over either a stream (TCP-like) or datagram
//! (UDP-like) transport. This crate extracts the handshake state machine,
//! AEAD record framing, replay window, and renegotiation path of a
//! peer-to-peer VPN daemon's transport-security layer; it never touches a
//! socket itself.
//!
//! ## Modules
//!
//! - [`core`]: wire constants, the `SptpsError` enum, and the `Logger` hook
//! - [`crypto`]: cipher abstraction, key exchange, signing, and the PRF
//! - [`replay`]: the sliding-window anti-replay check
//! - [`framing`]: stream and datagram record wire formats
//! - [`handshake`]: KEX/SIG wire messages and handshake state
//! - [`session`]: the [`Session`] façade tying all of the above together
//!
//! ## Example
//!
//! ```no_run
//! use sptps::prelude::*;
//!
//! struct Wire;
//! impl SessionCallbacks for Wire {
//!     fn send_data(&mut self, _data: &[u8]) -> bool { true }
//!     fn receive_record(&mut self, _record_type: u8, _payload: &[u8]) -> bool { true }
//! }
//!
//! let my_key = LongTermKeypair::generate();
//! let peer_key = LongTermKeypair::generate();
//! let mut wire = Wire;
//! let session = Session::start(
//!     StartParams {
//!         initiator: true,
//!         datagram: false,
//!         my_key: &my_key,
//!         peer_key: peer_key.public_key(),
//!         label: b"example.v1".to_vec(),
//!         cipher_suites: 0,
//!         preferred_suite: CHACHA20_POLY1305,
//!         replaywin: DEFAULT_REPLAY_WINDOW_BYTES,
//!         logger: Box::new(NullLogger),
//!     },
//!     &mut wire,
//! );
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;
pub mod crypto;
pub mod framing;
pub mod handshake;
pub mod replay;
mod session;

pub use session::{Session, SessionCallbacks, StartParams};

/// Convenient re-export of the crate's public surface.
pub mod prelude {
    pub use crate::core::{
        DEFAULT_REPLAY_WINDOW_BYTES, HANDSHAKE_RECORD_TYPE, LogLevel, Logger, NullLogger, SptpsError,
        StderrLogger,
    };
    pub use crate::crypto::{AES_256_GCM, CHACHA20_POLY1305, CipherSuite, EphemeralKeypair, LongTermKeypair};
    pub use crate::handshake::HandshakeState;
    pub use crate::session::{Session, SessionCallbacks, StartParams};
}

pub use core::{DEFAULT_REPLAY_WINDOW_BYTES, SptpsError};
pub use crypto::{AES_256_GCM, CHACHA20_POLY1305, LongTermKeypair};
pub use handshake::HandshakeState;
