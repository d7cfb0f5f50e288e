//! Echo client: drives an initiator [`Session`] over TCP or UDP.

use std::io::{self, BufRead, Read, Write};
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::time::Duration;

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

/// Connect to the server over TCP, complete the handshake, then either run
/// a fixed set of test messages or echo stdin lines persistently.
pub fn run_tcp(
    server_addr: SocketAddr,
    my_key: LongTermKeypair,
    peer_key: [u8; 32],
    persistent: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let stream = TcpStream::connect(server_addr)?;
    eprintln!("connected to {server_addr}");
    let mut reader = stream.try_clone()?;
    let mut wire = TcpWire { stream, pending: None };

    let mut session = Session::start(
        StartParams {
            initiator: true,
            datagram: false,
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

    wait_for_handshake(&mut session, &mut wire, &mut reader)?;
    eprintln!("handshake complete, session established");

    if persistent {
        run_persistent(&mut session, &mut wire, &mut reader)
    } else {
        run_test_messages(&mut session, &mut wire, &mut reader)
    }
}

fn wait_for_handshake<R: Read>(
    session: &mut Session<'_, TcpWire>,
    wire: &mut TcpWire,
    reader: &mut R,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut buf = [0u8; 4096];
    while !session.established() {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Err("connection closed during handshake".into());
        }
        session.receive_data(wire, &buf[..n])?;
    }
    Ok(())
}

fn wait_for_echo<R: Read>(
    session: &mut Session<'_, TcpWire>,
    wire: &mut TcpWire,
    reader: &mut R,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut buf = [0u8; 4096];
    loop {
        if let Some(payload) = wire.pending.take() {
            return Ok(payload);
        }
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Err("connection closed while waiting for echo".into());
        }
        session.receive_data(wire, &buf[..n])?;
    }
}

fn run_test_messages<R: Read>(
    session: &mut Session<'_, TcpWire>,
    wire: &mut TcpWire,
    reader: &mut R,
) -> Result<(), Box<dyn std::error::Error>> {
    let messages = ["Hello, SPTPS!", "Echo test 1", "Echo test 2", "Goodbye!"];
    for msg in messages {
        session.send_record(wire, ECHO_RECORD_TYPE, msg.as_bytes())?;
        let echoed = wait_for_echo(session, wire, reader)?;
        if echoed == msg.as_bytes() {
            eprintln!("echo matched: {msg:?}");
        } else {
            eprintln!("echo mismatch: expected {msg:?}, got {:?}", String::from_utf8_lossy(&echoed));
        }
    }
    eprintln!("echo client test complete");
    Ok(())
}

fn run_persistent<R: Read>(
    session: &mut Session<'_, TcpWire>,
    wire: &mut TcpWire,
    reader: &mut R,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("persistent mode: enter lines to echo (ctrl-d to exit)");
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        session.send_record(wire, ECHO_RECORD_TYPE, line.as_bytes())?;
        let echoed = wait_for_echo(session, wire, reader)?;
        println!("{}", String::from_utf8_lossy(&echoed));
    }
    Ok(())
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

/// Connect to the server over UDP, complete the handshake, then run a
/// fixed set of test messages with simple retry-on-timeout.
pub fn run_udp(server_addr: SocketAddr, my_key: LongTermKeypair, peer_key: [u8; 32]) -> Result<(), Box<dyn std::error::Error>> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(server_addr)?;
    socket.set_read_timeout(Some(Duration::from_millis(500)))?;
    eprintln!("connected to {server_addr} (udp)");

    let mut wire = UdpWire { socket: socket.try_clone()?, pending: None };
    let mut session = Session::start(
        StartParams {
            initiator: true,
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

    handshake_over_udp(&mut session, &mut wire)?;
    eprintln!("handshake complete, session established");

    for msg in ["Hello, SPTPS!", "Echo test 1", "Echo test 2", "Goodbye!"] {
        send_and_await_echo_udp(&mut session, &mut wire, msg.as_bytes())?;
    }
    eprintln!("echo client test complete");
    Ok(())
}

fn is_timeout(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut
}

fn handshake_over_udp(session: &mut Session<'_, UdpWire>, wire: &mut UdpWire) -> Result<(), Box<dyn std::error::Error>> {
    let mut buf = [0u8; 2048];
    let mut attempts = 0;
    while !session.established() {
        match wire.socket.recv(&mut buf) {
            Ok(n) => session.receive_data(wire, &buf[..n])?,
            Err(e) if is_timeout(&e) => {
                attempts += 1;
                if attempts > 10 {
                    return Err("handshake timed out over UDP".into());
                }
            }
            Err(e) => return Err(e.into()),
        };
    }
    Ok(())
}

fn send_and_await_echo_udp(session: &mut Session<'_, UdpWire>, wire: &mut UdpWire, msg: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    session.send_record(wire, ECHO_RECORD_TYPE, msg)?;
    let mut buf = [0u8; 2048];
    for attempt in 0..3 {
        loop {
            match wire.socket.recv(&mut buf) {
                Ok(n) => {
                    session.receive_data(wire, &buf[..n])?;
                    if let Some(payload) = wire.pending.take() {
                        if payload == msg {
                            eprintln!("echo matched: {:?}", String::from_utf8_lossy(msg));
                        } else {
                            eprintln!("echo mismatch: got {:?}", String::from_utf8_lossy(&payload));
                        }
                        return Ok(());
                    }
                }
                Err(e) if is_timeout(&e) => break,
                Err(e) => return Err(e.into()),
            }
        }
        eprintln!("no response, retrying (attempt {})", attempt + 1);
        session.send_record(wire, ECHO_RECORD_TYPE, msg)?;
    }
    Err("no response from server after 3 attempts".into())
}
