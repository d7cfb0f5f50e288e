//! The session façade (§5, §6): owns handshake state, both directions'
//! cipher contexts, the replay window, and the stream reassembly buffer,
//! and drives the §4.3 transition table.

use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroize;

use crate::core::{
    AEAD_KEY_SIZE, HANDSHAKE_RECORD_TYPE, KEX_NONCE_SIZE, KEY_MATERIAL_HALF_SIZE, KEY_MATERIAL_SIZE,
    LogLevel, Logger, ProtocolViolation, REKEY_ADVISORY_SEQNO, SptpsError, is_application_record,
    sptps_log,
};
use crate::crypto::{self, CipherContext, CipherSuite, EphemeralKeypair, LongTermKeypair};
use crate::framing::{datagram, stream};
use crate::handshake::{self, HandshakeState, KexMessage};
use crate::replay::ReplayWindow;

/// The two callbacks a transport must provide, replacing the reference's
/// `send_data`/`receive_record` function pointers plus opaque `handle`.
///
/// Implementations must not call back into the [`Session`] that invoked
/// them (the reference's non-reentrancy rule); do any further session
/// calls after the outer one returns.
pub trait SessionCallbacks {
    /// Write one already-framed record to the transport. Returns `false`
    /// on a hard transport failure (the session then fails the operation
    /// that triggered the write).
    fn send_data(&mut self, data: &[u8]) -> bool;

    /// Deliver one decoded record to the application. `record_type ==
    /// HANDSHAKE_RECORD_TYPE` with an empty `payload` signals "handshake
    /// complete" (or, for a renegotiation, "rekeyed"). Returning `false`
    /// aborts the session.
    fn receive_record(&mut self, record_type: u8, payload: &[u8]) -> bool;
}

/// Parameters to [`Session::start`].
pub struct StartParams<'a> {
    /// Whether this side is the handshake initiator.
    pub initiator: bool,
    /// `true` for datagram transport, `false` for stream transport.
    pub datagram: bool,
    /// This side's long-term signing keypair. Borrowed for the session's
    /// whole lifetime; the session never owns it.
    pub my_key: &'a LongTermKeypair,
    /// The peer's long-term public key.
    pub peer_key: [u8; crate::core::SIGNING_KEY_SIZE],
    /// PRF domain-separation label, copied into the session.
    pub label: Vec<u8>,
    /// This side's enabled-suite bitmap. `0` means "all suites this build
    /// supports" ([`crate::crypto::all_supported_mask`]).
    pub cipher_suites: u16,
    /// This side's preferred suite id.
    pub preferred_suite: u8,
    /// Replay window size in bytes; `0` disables replay protection.
    pub replaywin: usize,
    /// Where to send log events. Defaults to [`crate::core::NullLogger`]
    /// if the caller does not care.
    pub logger: Box<dyn Logger>,
}

/// An SPTPS session. Generic over the transport callback type so that
/// `send_data`/`receive_record` calls are static dispatch, not `dyn`.
pub struct Session<'a, C: SessionCallbacks> {
    initiator: bool,
    datagram: bool,
    my_key: &'a LongTermKeypair,
    peer_key: [u8; crate::core::SIGNING_KEY_SIZE],
    label: Vec<u8>,
    own_mask: u16,
    preferred_suite: u8,
    selected_suite: Option<CipherSuite>,

    state: HandshakeState,
    ephemeral: Option<EphemeralKeypair>,
    my_kex: Option<KexMessage>,
    peer_kex: Option<KexMessage>,
    my_kex_bytes: Option<[u8; crate::core::KEX_MESSAGE_SIZE]>,
    peer_kex_bytes: Option<[u8; crate::core::KEX_MESSAGE_SIZE]>,
    key_material: Option<[u8; KEY_MATERIAL_SIZE]>,

    outbound_cipher: Option<CipherContext>,
    inbound_cipher: Option<CipherContext>,
    outstate: bool,
    instate: bool,
    outseqno: u32,
    replay: ReplayWindow,
    replaywin_bytes: usize,

    inbuf: Vec<u8>,
    stopped: bool,

    logger: Box<dyn Logger>,
}

impl<'a, C: SessionCallbacks> Session<'a, C> {
    /// Start a new session: allocate state, generate the first ephemeral
    /// keypair, and send the initial KEX record. Both initiator and
    /// responder call this the same way; the wire exchange itself decides
    /// who sends SIG first (§4.3).
    pub fn start(params: StartParams<'a>, callbacks: &mut C) -> Result<Self, SptpsError> {
        let own_mask = if params.cipher_suites == 0 {
            crypto::all_supported_mask()
        } else {
            params.cipher_suites
        };
        let mut session = Session {
            initiator: params.initiator,
            datagram: params.datagram,
            my_key: params.my_key,
            peer_key: params.peer_key,
            label: params.label,
            own_mask,
            preferred_suite: params.preferred_suite,
            selected_suite: None,
            state: HandshakeState::Kex,
            ephemeral: None,
            my_kex: None,
            peer_kex: None,
            my_kex_bytes: None,
            peer_kex_bytes: None,
            key_material: None,
            outbound_cipher: None,
            inbound_cipher: None,
            outstate: false,
            instate: false,
            outseqno: 0,
            replay: ReplayWindow::new(params.replaywin),
            replaywin_bytes: params.replaywin,
            inbuf: Vec::new(),
            stopped: false,
            logger: params.logger,
        };
        let result = session.begin_kex(callbacks);
        if let Err(ref e) = result {
            session.log_error(e);
        }
        result?;
        Ok(session)
    }

    /// Current handshake state, mostly useful for tests and diagnostics.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Whether the handshake has completed at least once (outbound and
    /// inbound traffic can flow).
    pub fn established(&self) -> bool {
        self.outstate && self.instate
    }

    /// Advisory only: neither the wire protocol nor this implementation
    /// rekeys automatically. A caller that wants forward-secrecy rotation
    /// should call [`Session::force_kex`] once this returns `true`.
    pub fn should_rekey(&self) -> bool {
        self.outseqno >= REKEY_ADVISORY_SEQNO || self.replay.inseqno() >= REKEY_ADVISORY_SEQNO
    }

    /// Send one application record. Fails with [`SptpsError::MisuseError`]
    /// if the handshake has not completed yet or `record_type` is not a
    /// valid application type (`>= HANDSHAKE_RECORD_TYPE`).
    pub fn send_record(&mut self, callbacks: &mut C, record_type: u8, payload: &[u8]) -> Result<(), SptpsError> {
        let result = self.send_record_inner(callbacks, record_type, payload);
        if let Err(ref e) = result {
            self.log_error(e);
        }
        result
    }

    fn send_record_inner(&mut self, callbacks: &mut C, record_type: u8, payload: &[u8]) -> Result<(), SptpsError> {
        if self.stopped || !self.established() {
            return Err(SptpsError::MisuseError("send_record before handshake completed"));
        }
        if !is_application_record(record_type) {
            return Err(SptpsError::MisuseError("application record type must be < HANDSHAKE_RECORD_TYPE"));
        }
        if !self.encode_and_send(callbacks, record_type, payload) {
            return Err(SptpsError::ResourceFailure("transport write failed"));
        }
        Ok(())
    }

    /// Feed freshly-received bytes in. For datagram transport `bytes` must
    /// be exactly one datagram; for stream transport it may be any chunk
    /// and is buffered until complete records can be decoded. Returns the
    /// number of bytes consumed (always `bytes.len()` for datagram).
    pub fn receive_data(&mut self, callbacks: &mut C, bytes: &[u8]) -> Result<usize, SptpsError> {
        if self.stopped {
            let err = SptpsError::MisuseError("receive_data after stop");
            self.log_error(&err);
            return Err(err);
        }
        let result = if self.datagram {
            self.receive_one_datagram(callbacks, bytes).map(|()| bytes.len())
        } else {
            self.receive_stream_bytes(callbacks, bytes)
        };
        if let Err(ref e) = result {
            self.log_error(e);
        }
        result
    }

    /// Read-only replay probe for datagram transport (invariant 4): checks
    /// whether `datagram` would be accepted without admitting it into the
    /// replay window or invoking any callback. Always `false` for stream
    /// transport or before the handshake has completed.
    pub fn verify_datagram(&mut self, datagram_bytes: &[u8]) -> bool {
        if !self.datagram || !self.instate {
            return false;
        }
        let cipher = self.inbound_cipher.as_ref();
        match datagram::decode(datagram_bytes, cipher) {
            Ok((seqno, _record_type, _payload)) => self.replay.check(seqno, false).is_ok(),
            Err(_) => false,
        }
    }

    /// Start a new handshake over an already-established session, rekeying
    /// both directions. Only valid from [`HandshakeState::SecondaryKex`]
    /// with the session already established.
    pub fn force_kex(&mut self, callbacks: &mut C) -> Result<(), SptpsError> {
        let result = self.force_kex_inner(callbacks);
        if let Err(ref e) = result {
            self.log_error(e);
        }
        result
    }

    fn force_kex_inner(&mut self, callbacks: &mut C) -> Result<(), SptpsError> {
        if self.state != HandshakeState::SecondaryKex || !self.established() {
            return Err(SptpsError::MisuseError("force_kex only valid from an established session"));
        }
        self.begin_kex(callbacks)
    }

    /// Tear the session down: wipe all key material and cipher state, and
    /// refuse further operations. Idempotent.
    pub fn stop(&mut self) {
        self.ephemeral = None;
        self.my_kex = None;
        self.peer_kex = None;
        self.my_kex_bytes = None;
        self.peer_kex_bytes = None;
        self.wipe_key_material();
        self.outbound_cipher = None;
        self.inbound_cipher = None;
        self.outstate = false;
        self.instate = false;
        self.inbuf.clear();
        self.stopped = true;
    }

    // ---- internal: logging ------------------------------------------------

    fn log_error(&self, err: &SptpsError) {
        sptps_log!(self.logger, LogLevel::Error, Some(err), "session operation failed");
    }

    fn log_info(&self, message: &str) {
        sptps_log!(self.logger, LogLevel::Info, None, "{message}");
    }

    // ---- internal: key material halves ------------------------------------

    /// Bytes `[0..64)` belong to the initiator's outbound / responder's
    /// inbound direction; `[64..128)` the reverse (§4.2, §4.7).
    fn inbound_half(&self, material: &[u8; KEY_MATERIAL_SIZE]) -> [u8; AEAD_KEY_SIZE] {
        let half = if self.initiator { &material[0..KEY_MATERIAL_HALF_SIZE] } else { &material[KEY_MATERIAL_HALF_SIZE..] };
        let mut key = [0u8; AEAD_KEY_SIZE];
        key.copy_from_slice(&half[..AEAD_KEY_SIZE]);
        key
    }

    fn outbound_half(&self, material: &[u8; KEY_MATERIAL_SIZE]) -> [u8; AEAD_KEY_SIZE] {
        let half = if self.initiator { &material[KEY_MATERIAL_HALF_SIZE..] } else { &material[0..KEY_MATERIAL_HALF_SIZE] };
        let mut key = [0u8; AEAD_KEY_SIZE];
        key.copy_from_slice(&half[..AEAD_KEY_SIZE]);
        key
    }

    fn wipe_key_material(&mut self) {
        if let Some(mut material) = self.key_material.take() {
            material.zeroize();
        }
    }

    fn build_pending_inbound_cipher(&self) -> Result<CipherContext, SptpsError> {
        let material = self.key_material.as_ref().ok_or(SptpsError::ProtocolViolation(ProtocolViolation::UnexpectedState {
            state: self.state.name(),
        }))?;
        let key = self.inbound_half(material);
        let suite = self
            .selected_suite
            .expect("suite is selected before a session can reach the ACK state");
        CipherContext::init(suite, key)
    }

    // ---- internal: sending --------------------------------------------------

    /// Encode `payload` as `record_type` and hand it to the transport.
    /// Uses the current outbound cipher once `outstate` is true (true for
    /// both application records and handshake records sent mid-
    /// renegotiation), otherwise sends in the clear. Advances `outseqno`
    /// only for records actually sent under a cipher.
    fn encode_and_send(&mut self, callbacks: &mut C, record_type: u8, payload: &[u8]) -> bool {
        let seqno = self.outseqno;
        let wire = if self.datagram {
            let cipher = if self.outstate { self.outbound_cipher.as_ref() } else { None };
            datagram::encode(seqno, record_type, payload, cipher)
        } else {
            let cipher = if self.outstate {
                Some((self.outbound_cipher.as_ref().expect("outstate implies an outbound cipher"), seqno))
            } else {
                None
            };
            stream::encode(record_type, payload, cipher)
        };
        let sent = callbacks.send_data(&wire);
        if sent && self.outstate {
            self.outseqno = self.outseqno.wrapping_add(1);
        }
        sent
    }

    // ---- internal: handshake driver (§4.3) ----------------------------------

    /// Generate a fresh ephemeral keypair and nonce, send KEX, and move to
    /// [`HandshakeState::Kex`]. Used both by `start` (the very first KEX)
    /// and by `force_kex`/an unprompted peer KEX (renegotiation).
    fn begin_kex(&mut self, callbacks: &mut C) -> Result<(), SptpsError> {
        let ephemeral = EphemeralKeypair::generate();
        let mut nonce = [0u8; KEX_NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        let kex = KexMessage {
            version: crate::core::KEX_VERSION,
            preferred_suite: self.preferred_suite,
            suite_mask: self.own_mask,
            nonce,
            ephemeral_pub: ephemeral.public_key(),
        };
        let wire_payload = kex.encode();

        self.ephemeral = Some(ephemeral);
        self.my_kex_bytes = Some(wire_payload);
        self.my_kex = Some(kex);
        self.state = HandshakeState::Kex;

        if !self.encode_and_send(callbacks, HANDSHAKE_RECORD_TYPE, &wire_payload) {
            return Err(SptpsError::ResourceFailure("transport write failed sending KEX"));
        }
        self.log_info("sent KEX");
        Ok(())
    }

    /// Sign the handshake transcript and send SIG.
    fn send_sig(&mut self, callbacks: &mut C) -> Result<(), SptpsError> {
        let my_kex_bytes = self
            .my_kex_bytes
            .expect("my_kex_bytes is set before entering the SIG state");
        let peer_kex_bytes = self
            .peer_kex_bytes
            .expect("peer_kex_bytes is set before sending SIG");
        let (initiator_kex, responder_kex) = if self.initiator {
            (&my_kex_bytes, &peer_kex_bytes)
        } else {
            (&peer_kex_bytes, &my_kex_bytes)
        };
        let input = handshake::sig_input(self.initiator, initiator_kex, responder_kex, &self.label);
        let sig = self.my_key.sign(&input);
        if !self.encode_and_send(callbacks, HANDSHAKE_RECORD_TYPE, &sig) {
            return Err(SptpsError::ResourceFailure("transport write failed sending SIG"));
        }
        self.log_info("sent SIG");
        Ok(())
    }

    /// `KEX` / `SECONDARY_KEX` state: a handshake record arrived and is the
    /// peer's KEX message.
    fn on_peer_kex(&mut self, callbacks: &mut C, payload: &[u8]) -> Result<(), SptpsError> {
        if self.state == HandshakeState::SecondaryKex {
            // The peer started a renegotiation we did not request; match
            // it by starting our own before processing theirs.
            self.begin_kex(callbacks)?;
        }

        let peer_kex = KexMessage::decode(payload)?;
        let suite = crypto::negotiate(self.own_mask, peer_kex.suite_mask, self.preferred_suite, peer_kex.preferred_suite)?;
        self.selected_suite = Some(suite);
        self.peer_kex_bytes = Some(peer_kex.encode());
        self.peer_kex = Some(peer_kex);

        if self.initiator {
            self.send_sig(callbacks)?;
        }
        self.state = HandshakeState::Sig;
        Ok(())
    }

    /// `SIG` state: a handshake record arrived and is the peer's signature
    /// over the transcript.
    fn on_peer_sig(&mut self, callbacks: &mut C, payload: &[u8]) -> Result<(), SptpsError> {
        if payload.len() != crate::core::ECDSA_SIZE {
            return Err(ProtocolViolation::WrongLength {
                expected: crate::core::ECDSA_SIZE,
                actual: payload.len(),
            }
            .into());
        }

        let my_kex_bytes = self
            .my_kex_bytes
            .ok_or(SptpsError::ProtocolViolation(ProtocolViolation::UnexpectedState { state: self.state.name() }))?;
        let peer_kex_bytes = self
            .peer_kex_bytes
            .ok_or(SptpsError::ProtocolViolation(ProtocolViolation::UnexpectedState { state: self.state.name() }))?;
        let (initiator_kex, responder_kex) = if self.initiator {
            (&my_kex_bytes, &peer_kex_bytes)
        } else {
            (&peer_kex_bytes, &my_kex_bytes)
        };
        // Verifying the peer's signature: they signed with `originator =
        // !our_role`.
        let input = handshake::sig_input(!self.initiator, initiator_kex, responder_kex, &self.label);
        let mut sig = [0u8; crate::core::ECDSA_SIZE];
        sig.copy_from_slice(payload);
        crypto::verify(&self.peer_key, &input, &sig)?;

        let peer_ephemeral_pub = self.peer_kex.as_ref().expect("peer_kex is set before send_sig").ephemeral_pub;
        let shared_secret = self
            .ephemeral
            .as_mut()
            .expect("ephemeral is held until SIG completes")
            .diffie_hellman(&peer_ephemeral_pub)?;

        let (initiator_nonce, responder_nonce) = if self.initiator {
            (self.my_kex.as_ref().unwrap().nonce, self.peer_kex.as_ref().unwrap().nonce)
        } else {
            (self.peer_kex.as_ref().unwrap().nonce, self.my_kex.as_ref().unwrap().nonce)
        };
        let material = crypto::derive_key_material(&shared_secret, &initiator_nonce, &responder_nonce, &self.label)?;
        self.key_material = Some(material);

        if !self.initiator {
            self.send_sig(callbacks)?;
        }

        // The ephemeral secret and both KEX messages have done their job;
        // the transcript and shared secret they fed into are no longer
        // needed (§3).
        self.ephemeral = None;
        self.my_kex = None;
        self.peer_kex = None;
        self.my_kex_bytes = None;
        self.peer_kex_bytes = None;

        if self.outstate {
            self.swap_to_new_outbound_key()?;
            self.state = HandshakeState::Ack;
            if !self.encode_and_send(callbacks, HANDSHAKE_RECORD_TYPE, &[]) {
                return Err(SptpsError::ResourceFailure("transport write failed sending ACK"));
            }
            self.log_info("sent ACK, awaiting peer ACK");
            Ok(())
        } else {
            self.install_both_ciphers()?;
            self.state = HandshakeState::SecondaryKex;
            self.log_info("handshake established");
            if !callbacks.receive_record(HANDSHAKE_RECORD_TYPE, &[]) {
                return Err(SptpsError::ResourceFailure("caller rejected handshake-complete notification"));
            }
            Ok(())
        }
    }

    /// First handshake only: both directions come up together, with this
    /// side's own processing standing in for an explicit ACK exchange.
    fn install_both_ciphers(&mut self) -> Result<(), SptpsError> {
        let material = *self.key_material.as_ref().expect("key material was just derived");
        let suite = self.selected_suite.expect("suite was selected in on_peer_kex");
        let outbound_key = self.outbound_half(&material);
        let inbound_key = self.inbound_half(&material);
        self.outbound_cipher = Some(CipherContext::init(suite, outbound_key)?);
        self.inbound_cipher = Some(CipherContext::init(suite, inbound_key)?);
        self.outseqno = 0;
        self.replay = ReplayWindow::new(self.replaywin_bytes);
        self.outstate = true;
        self.instate = true;
        self.wipe_key_material();
        Ok(())
    }

    /// Renegotiation: switch this side's outbound direction to the new
    /// key. The ACK record about to be sent is the first one encrypted
    /// under it.
    fn swap_to_new_outbound_key(&mut self) -> Result<(), SptpsError> {
        let material = *self.key_material.as_ref().expect("key material was just derived");
        let suite = self.selected_suite.expect("suite was selected in on_peer_kex");
        let outbound_key = self.outbound_half(&material);
        self.outbound_cipher = Some(CipherContext::init(suite, outbound_key)?);
        self.outseqno = 0;
        Ok(())
    }

    /// Renegotiation: having received the peer's ACK (decrypted under the
    /// not-yet-committed new inbound key), commit it as the live inbound
    /// cipher and finish.
    fn complete_ack(&mut self, callbacks: &mut C, pending_cipher: CipherContext) -> Result<(), SptpsError> {
        self.inbound_cipher = Some(pending_cipher);
        self.replay = ReplayWindow::new(self.replaywin_bytes);
        self.instate = true;
        self.wipe_key_material();
        self.state = HandshakeState::SecondaryKex;
        self.log_info("rekeyed");
        if !callbacks.receive_record(HANDSHAKE_RECORD_TYPE, &[]) {
            return Err(SptpsError::ResourceFailure("caller rejected handshake-complete notification"));
        }
        Ok(())
    }

    fn dispatch(&mut self, callbacks: &mut C, record_type: u8, payload: &[u8]) -> Result<(), SptpsError> {
        if record_type == HANDSHAKE_RECORD_TYPE {
            match self.state {
                HandshakeState::Kex | HandshakeState::SecondaryKex => self.on_peer_kex(callbacks, payload),
                HandshakeState::Sig => self.on_peer_sig(callbacks, payload),
                HandshakeState::Ack => Err(SptpsError::ProtocolViolation(ProtocolViolation::UnexpectedState {
                    state: self.state.name(),
                })),
            }
        } else if is_application_record(record_type) {
            if !self.instate {
                return Err(SptpsError::ProtocolViolation(ProtocolViolation::UnexpectedState {
                    state: self.state.name(),
                }));
            }
            if !callbacks.receive_record(record_type, payload) {
                return Err(SptpsError::ResourceFailure("caller rejected record"));
            }
            Ok(())
        } else {
            Err(SptpsError::ProtocolViolation(ProtocolViolation::UnknownRecordType(record_type)))
        }
    }

    // ---- internal: receive paths --------------------------------------------

    fn receive_one_datagram(&mut self, callbacks: &mut C, wire: &[u8]) -> Result<(), SptpsError> {
        if self.state == HandshakeState::Ack {
            let pending_cipher = self.build_pending_inbound_cipher()?;
            let (_seqno, record_type, payload) = datagram::decode(wire, Some(&pending_cipher))?;
            if record_type != HANDSHAKE_RECORD_TYPE || !payload.is_empty() {
                return Err(SptpsError::ProtocolViolation(ProtocolViolation::UnexpectedState {
                    state: self.state.name(),
                }));
            }
            return self.complete_ack(callbacks, pending_cipher);
        }

        let cipher = if self.instate { self.inbound_cipher.as_ref() } else { None };
        let (seqno, record_type, payload) = datagram::decode(wire, cipher)?;
        if self.instate {
            self.replay.check(seqno, true)?;
        }
        self.dispatch(callbacks, record_type, &payload)
    }

    fn receive_stream_bytes(&mut self, callbacks: &mut C, bytes: &[u8]) -> Result<usize, SptpsError> {
        self.inbuf.extend_from_slice(bytes);
        let consumed = bytes.len();

        loop {
            if self.inbuf.len() < crate::core::STREAM_HEADER_SIZE - 1 {
                break;
            }
            let declared = stream::declared_payload_len(&self.inbuf[..2]);
            let needed_body = stream::body_size(declared, self.instate);
            let total_needed = 2 + needed_body;
            if self.inbuf.len() < total_needed {
                break;
            }
            let frame: Vec<u8> = self.inbuf.drain(..total_needed).collect();
            let body = &frame[2..];

            if self.state == HandshakeState::Ack {
                let pending_cipher = self.build_pending_inbound_cipher()?;
                let (record_type, payload) = stream::decode(body, Some((&pending_cipher, 0)))?;
                if record_type != HANDSHAKE_RECORD_TYPE || !payload.is_empty() {
                    return Err(SptpsError::ProtocolViolation(ProtocolViolation::UnexpectedState {
                        state: self.state.name(),
                    }));
                }
                self.complete_ack(callbacks, pending_cipher)?;
                continue;
            }

            let seqno = self.replay.inseqno();
            let cipher_ref = if self.instate {
                Some((self.inbound_cipher.as_ref().expect("instate implies an inbound cipher"), seqno))
            } else {
                None
            };
            let (record_type, payload) = stream::decode(body, cipher_ref)?;
            if self.instate {
                // Stream transport never reorders; this check always takes
                // the in-order branch and simply advances `inseqno`.
                self.replay.check(seqno, true)?;
            }
            self.dispatch(callbacks, record_type, &payload)?;
        }

        Ok(consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NullLogger;

    /// An in-memory transport double wiring two sessions directly
    /// together, used in place of real sockets.
    #[derive(Default)]
    struct Loopback {
        outbox: Vec<Vec<u8>>,
        received: Vec<(u8, Vec<u8>)>,
        handshake_events: u32,
        reject_next: bool,
    }

    impl SessionCallbacks for Loopback {
        fn send_data(&mut self, data: &[u8]) -> bool {
            self.outbox.push(data.to_vec());
            true
        }

        fn receive_record(&mut self, record_type: u8, payload: &[u8]) -> bool {
            if self.reject_next {
                self.reject_next = false;
                return false;
            }
            if record_type == HANDSHAKE_RECORD_TYPE {
                self.handshake_events += 1;
            } else {
                self.received.push((record_type, payload.to_vec()));
            }
            true
        }
    }

    fn keypair(seed: u8) -> LongTermKeypair {
        LongTermKeypair::from_bytes(&[seed; 32])
    }

    fn start_params<'a>(initiator: bool, datagram: bool, my_key: &'a LongTermKeypair, peer_key: [u8; 32]) -> StartParams<'a> {
        StartParams {
            initiator,
            datagram,
            my_key,
            peer_key,
            label: b"test label".to_vec(),
            cipher_suites: 0,
            preferred_suite: 0,
            replaywin: 16,
            logger: Box::new(NullLogger),
        }
    }

    /// Drain one side's outbox into the other's `receive_data`, repeatedly,
    /// until neither side has anything queued. Simulates a lossless,
    /// in-order transport.
    fn pump(
        a: &mut Session<'_, Loopback>,
        a_cb: &mut Loopback,
        b: &mut Session<'_, Loopback>,
        b_cb: &mut Loopback,
    ) {
        loop {
            let a_out: Vec<Vec<u8>> = a_cb.outbox.drain(..).collect();
            let b_out: Vec<Vec<u8>> = b_cb.outbox.drain(..).collect();
            if a_out.is_empty() && b_out.is_empty() {
                break;
            }
            for wire in a_out {
                b.receive_data(b_cb, &wire).unwrap();
            }
            for wire in b_out {
                a.receive_data(a_cb, &wire).unwrap();
            }
        }
    }

    #[test]
    fn scenario_s1_handshake_and_data_transfer_stream() {
        let key_a = keypair(1);
        let key_b = keypair(2);
        let mut cb_a = Loopback::default();
        let mut cb_b = Loopback::default();

        let mut a = Session::start(start_params(true, false, &key_a, key_b.public_key()), &mut cb_a).unwrap();
        let mut b = Session::start(start_params(false, false, &key_b, key_a.public_key()), &mut cb_b).unwrap();

        pump(&mut a, &mut cb_a, &mut b, &mut cb_b);

        assert!(a.established());
        assert!(b.established());
        assert_eq!(cb_a.handshake_events, 1);
        assert_eq!(cb_b.handshake_events, 1);

        a.send_record(&mut cb_a, 3, b"hello from a").unwrap();
        pump(&mut a, &mut cb_a, &mut b, &mut cb_b);
        assert_eq!(cb_b.received, vec![(3, b"hello from a".to_vec())]);

        b.send_record(&mut cb_b, 4, b"hello from b").unwrap();
        pump(&mut a, &mut cb_a, &mut b, &mut cb_b);
        assert_eq!(cb_a.received, vec![(4, b"hello from b".to_vec())]);
    }

    #[test]
    fn scenario_s1_handshake_and_data_transfer_datagram() {
        let key_a = keypair(1);
        let key_b = keypair(2);
        let mut cb_a = Loopback::default();
        let mut cb_b = Loopback::default();

        let mut a = Session::start(start_params(true, true, &key_a, key_b.public_key()), &mut cb_a).unwrap();
        let mut b = Session::start(start_params(false, true, &key_b, key_a.public_key()), &mut cb_b).unwrap();

        pump(&mut a, &mut cb_a, &mut b, &mut cb_b);
        assert!(a.established());
        assert!(b.established());

        a.send_record(&mut cb_a, 1, b"ping").unwrap();
        pump(&mut a, &mut cb_a, &mut b, &mut cb_b);
        assert_eq!(cb_b.received, vec![(1, b"ping".to_vec())]);
    }

    #[test]
    fn scenario_s3_datagram_replay_is_rejected() {
        let key_a = keypair(1);
        let key_b = keypair(2);
        let mut cb_a = Loopback::default();
        let mut cb_b = Loopback::default();

        let mut a = Session::start(start_params(true, true, &key_a, key_b.public_key()), &mut cb_a).unwrap();
        let mut b = Session::start(start_params(false, true, &key_b, key_a.public_key()), &mut cb_b).unwrap();
        pump(&mut a, &mut cb_a, &mut b, &mut cb_b);

        a.send_record(&mut cb_a, 1, b"once").unwrap();
        let wire = cb_a.outbox.drain(..).next().unwrap();
        b.receive_data(&mut cb_b, &wire).unwrap();
        assert_eq!(cb_b.received, vec![(1, b"once".to_vec())]);

        let err = b.receive_data(&mut cb_b, &wire).unwrap_err();
        assert!(matches!(err, SptpsError::ReplayDrop { .. }));
    }

    #[test]
    fn scenario_s5_renegotiation() {
        let key_a = keypair(1);
        let key_b = keypair(2);
        let mut cb_a = Loopback::default();
        let mut cb_b = Loopback::default();

        let mut a = Session::start(start_params(true, false, &key_a, key_b.public_key()), &mut cb_a).unwrap();
        let mut b = Session::start(start_params(false, false, &key_b, key_a.public_key()), &mut cb_b).unwrap();
        pump(&mut a, &mut cb_a, &mut b, &mut cb_b);

        a.send_record(&mut cb_a, 1, b"before rekey").unwrap();
        pump(&mut a, &mut cb_a, &mut b, &mut cb_b);
        cb_a.handshake_events = 0;
        cb_b.handshake_events = 0;

        a.force_kex(&mut cb_a).unwrap();
        pump(&mut a, &mut cb_a, &mut b, &mut cb_b);

        assert_eq!(a.state(), HandshakeState::SecondaryKex);
        assert_eq!(b.state(), HandshakeState::SecondaryKex);
        assert_eq!(cb_a.handshake_events, 1);
        assert_eq!(cb_b.handshake_events, 1);

        a.send_record(&mut cb_a, 2, b"after rekey").unwrap();
        pump(&mut a, &mut cb_a, &mut b, &mut cb_b);
        assert!(cb_b.received.contains(&(2, b"after rekey".to_vec())));
    }

    #[test]
    fn scenario_s6_bad_signature_aborts_handshake() {
        let key_a = keypair(1);
        let key_b = keypair(2);
        let wrong_peer_key = keypair(99).public_key();
        let mut cb_a = Loopback::default();
        let mut cb_b = Loopback::default();

        // `a` is told the wrong public key for `b`; the handshake must
        // fail once a verifies b's SIG.
        let mut a = Session::start(start_params(true, false, &key_a, wrong_peer_key), &mut cb_a).unwrap();
        let mut b = Session::start(start_params(false, false, &key_b, key_a.public_key()), &mut cb_b).unwrap();

        let mut last_err = None;
        'outer: for _ in 0..10 {
            let a_out: Vec<Vec<u8>> = cb_a.outbox.drain(..).collect();
            let b_out: Vec<Vec<u8>> = cb_b.outbox.drain(..).collect();
            if a_out.is_empty() && b_out.is_empty() {
                break;
            }
            for wire in a_out {
                if let Err(e) = b.receive_data(&mut cb_b, &wire) {
                    last_err = Some(e);
                    break 'outer;
                }
            }
            for wire in b_out {
                if let Err(e) = a.receive_data(&mut cb_a, &wire) {
                    last_err = Some(e);
                    break 'outer;
                }
            }
        }

        let err = last_err.expect("bad signature must surface as an error");
        assert!(matches!(err, SptpsError::CryptoFailure(_)));
        assert!(!a.established());
    }

    #[test]
    fn send_record_before_handshake_completes_is_rejected() {
        let key_a = keypair(1);
        let key_b = keypair(2);
        let mut cb_a = Loopback::default();
        let mut a = Session::start(start_params(true, false, &key_a, key_b.public_key()), &mut cb_a).unwrap();
        let err = a.send_record(&mut cb_a, 1, b"too early").unwrap_err();
        assert!(matches!(err, SptpsError::MisuseError(_)));
    }

    #[test]
    fn send_record_rejects_handshake_record_type() {
        let key_a = keypair(1);
        let key_b = keypair(2);
        let mut cb_a = Loopback::default();
        let mut cb_b = Loopback::default();
        let mut a = Session::start(start_params(true, false, &key_a, key_b.public_key()), &mut cb_a).unwrap();
        let mut b = Session::start(start_params(false, false, &key_b, key_a.public_key()), &mut cb_b).unwrap();
        pump(&mut a, &mut cb_a, &mut b, &mut cb_b);
        let err = a.send_record(&mut cb_a, HANDSHAKE_RECORD_TYPE, b"x").unwrap_err();
        assert!(matches!(err, SptpsError::MisuseError(_)));
    }

    #[test]
    fn verify_datagram_does_not_admit_into_replay_window() {
        let key_a = keypair(1);
        let key_b = keypair(2);
        let mut cb_a = Loopback::default();
        let mut cb_b = Loopback::default();
        let mut a = Session::start(start_params(true, true, &key_a, key_b.public_key()), &mut cb_a).unwrap();
        let mut b = Session::start(start_params(false, true, &key_b, key_a.public_key()), &mut cb_b).unwrap();
        pump(&mut a, &mut cb_a, &mut b, &mut cb_b);

        a.send_record(&mut cb_a, 1, b"probe me").unwrap();
        let wire = cb_a.outbox.drain(..).next().unwrap();

        assert!(b.verify_datagram(&wire));
        // Still not admitted: a real receive must still succeed afterwards.
        assert!(b.verify_datagram(&wire));
        b.receive_data(&mut cb_b, &wire).unwrap();
        assert_eq!(cb_b.received, vec![(1, b"probe me".to_vec())]);
    }

    #[test]
    fn stop_wipes_state_and_blocks_further_sends() {
        let key_a = keypair(1);
        let key_b = keypair(2);
        let mut cb_a = Loopback::default();
        let mut cb_b = Loopback::default();
        let mut a = Session::start(start_params(true, false, &key_a, key_b.public_key()), &mut cb_a).unwrap();
        let mut b = Session::start(start_params(false, false, &key_b, key_a.public_key()), &mut cb_b).unwrap();
        pump(&mut a, &mut cb_a, &mut b, &mut cb_b);

        a.stop();
        assert!(!a.established());
        let err = a.send_record(&mut cb_a, 1, b"x").unwrap_err();
        assert!(matches!(err, SptpsError::MisuseError(_)));
    }

    #[test]
    fn stop_blocks_further_receives() {
        let key_a = keypair(1);
        let key_b = keypair(2);
        let mut cb_a = Loopback::default();
        let mut cb_b = Loopback::default();
        let mut a = Session::start(start_params(true, false, &key_a, key_b.public_key()), &mut cb_a).unwrap();
        let mut b = Session::start(start_params(false, false, &key_b, key_a.public_key()), &mut cb_b).unwrap();
        pump(&mut a, &mut cb_a, &mut b, &mut cb_b);

        // Have b send a fresh KEX the way a renegotiation would, then stop
        // `a` before that record arrives: `a` must not process it and
        // restart its own handshake in response.
        b.force_kex(&mut cb_b).unwrap();
        let wire = cb_b.outbox.drain(..).next().unwrap();

        a.stop();
        let err = a.receive_data(&mut cb_a, &wire).unwrap_err();
        assert!(matches!(err, SptpsError::MisuseError(_)));
        assert!(cb_a.outbox.is_empty(), "a stopped session must not revive and send a KEX in response");
    }
}
