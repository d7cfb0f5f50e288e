//! Echo server: drives a responder [`Session`] per TCP connection, or one
//! over a UDP socket pinned to the first peer that writes to it.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};

use sptps::prelude::*;

use crate::ECHO_RECORD_TYPE;

struct TcpWire {
    stream: TcpStream,
    pending: Option<Vec<u8>>,
}

impl SessionCallbacks for TcpWire {
    fn send_data(&mut self, data: &[u8]) -> bool {
        self.stream.write_all(data).is_ok()
    }

    fn receive_record(&mut self, record_type: u8, payload: &[u8]) -> bool {
        if record_type == ECHO_RECORD_TYPE {
            self.pending = Some(payload.to_vec());
        }
        true
    }
}

/// Accept TCP connections one at a time; each gets its own responder
/// session against the one peer identity this server is configured for.
pub fn serve_tcp(bind_addr: SocketAddr, my_key: LongTermKeypair, peer_key: [u8; 32]) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(bind_addr)?;
    eprintln!("listening on {bind_addr} (tcp)");

    for stream in listener.incoming() {
        let stream = stream?;
        let peer_addr = stream.peer_addr()?;
        eprintln!("accepted connection from {peer_addr}");
        if let Err(e) = handle_tcp_connection(stream, &my_key, peer_key) {
            eprintln!("connection with {peer_addr} failed: {e}");
        }
    }
    Ok(())
}

fn handle_tcp_connection(stream: TcpStream, my_key: &LongTermKeypair, peer_key: [u8; 32]) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = stream.try_clone()?;
    let mut wire = TcpWire { stream, pending: None };

    let mut session = Session::start(
        StartParams {
            initiator: false,
            datagram: false,
            my_key,
            peer_key,
            label: b"sptps-echo.v1".to_vec(),
            cipher_suites: 0,
            preferred_suite: CHACHA20_POLY1305,
            replaywin: DEFAULT_REPLAY_WINDOW_BYTES,
            logger: Box::new(StderrLogger),
        },
        &mut wire,
    )?;

    let mut buf = [0u8; 4096];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            eprintln!("peer closed the connection");
            return Ok(());
        }
        session.receive_data(&mut wire, &buf[..n])?;
        if let Some(payload) = wire.pending.take() {
            session.send_record(&mut wire, ECHO_RECORD_TYPE, &payload)?;
        }
    }
}

struct UdpWire {
    socket: UdpSocket,
    pending: Option<Vec<u8>>,
}

impl SessionCallbacks for UdpWire {
    fn send_data(&mut self, data: &[u8]) -> bool {
        self.socket.send(data).is_ok()
    }

    fn receive_record(&mut self, record_type: u8, payload: &[u8]) -> bool {
        if record_type == ECHO_RECORD_TYPE {
            self.pending = Some(payload.to_vec());
        }
        true
    }
}

/// Wait for the first datagram, pin the socket to whoever sent it (the
/// one peer this server is configured for), then run a single session for
/// the rest of the process lifetime.
pub fn serve_udp(bind_addr: SocketAddr, my_key: LongTermKeypair, peer_key: [u8; 32]) -> Result<(), Box<dyn std::error::Error>> {
    let socket = UdpSocket::bind(bind_addr)?;
    eprintln!("listening on {bind_addr} (udp)");

    let mut buf = [0u8; 2048];
    let (n, peer_addr) = socket.recv_from(&mut buf)?;
    socket.connect(peer_addr)?;
    eprintln!("first packet from {peer_addr}, session pinned to it");

    let mut wire = UdpWire { socket: socket.try_clone()?, pending: None };
    let mut session = Session::start(
        StartParams {
            initiator: false,
            datagram: true,
            my_key: &my_key,
            peer_key,
            label: b"sptps-echo.v1".to_vec(),
            cipher_suites: 0,
            preferred_suite: CHACHA20_POLY1305,
            replaywin: DEFAULT_REPLAY_WINDOW_BYTES,
            logger: Box::new(StderrLogger),
        },
        &mut wire,
    )?;

    session.receive_data(&mut wire, &buf[..n])?;
    if let Some(payload) = wire.pending.take() {
        session.send_record(&mut wire, ECHO_RECORD_TYPE, &payload)?;
    }

    loop {
        let n = socket.recv(&mut buf)?;
        session.receive_data(&mut wire, &buf[..n])?;
        if let Some(payload) = wire.pending.take() {
            session.send_record(&mut wire, ECHO_RECORD_TYPE, &payload)?;
        }
    }
}
