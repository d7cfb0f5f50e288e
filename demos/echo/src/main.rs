//! SPTPS echo demo
//!
//! A minimal client/server that exchanges authenticated echo records over
//! a real TCP stream or UDP socket, driving [`sptps::Session`] directly —
//! no async runtime, since SPTPS itself is synchronous.
//!
//! # Environment Variables
//!
//! - `SPTPS_MODE`: "server" or "client" (required)
//! - `SPTPS_TRANSPORT`: "tcp" or "udp" (default: "tcp")
//! - `SPTPS_SERVER_HOST`: server hostname (client only, default: 127.0.0.1)
//! - `SPTPS_SERVER_PORT`: port (both, default: 19999)
//! - `SPTPS_BIND_ADDR`: bind address (server only, default: 0.0.0.0)
//! - `SPTPS_TEST_MODE`: "true" to use a fixed, well-known keypair for each
//!   side (conformance / quick-start only — never use this in production)
//! - `SPTPS_MY_PRIVATE_KEY`: base64 Ed25519 seed for this side's identity
//! - `SPTPS_PEER_PUBLIC_KEY`: base64 Ed25519 public key of the other side
//! - `SPTPS_PERSISTENT`: "true" for persistent client mode (TCP only)
//!
//! # Key Management
//!
//! SPTPS pins peer identity out of band, the way a VPN daemon pins peers
//! from its host config; it does not negotiate who it is talking to. Run
//! `cargo run -p sptps-echo --bin keygen` on each side, then set
//! `SPTPS_MY_PRIVATE_KEY` to your own seed and `SPTPS_PEER_PUBLIC_KEY` to
//! the other side's public key.
//!
//! # Examples
//!
//! ```bash
//! SPTPS_MODE=server SPTPS_TEST_MODE=true cargo run -p sptps-echo
//! SPTPS_MODE=client SPTPS_TEST_MODE=true cargo run -p sptps-echo
//! ```

mod client;
mod server;

use std::env;
use std::net::{SocketAddr, ToSocketAddrs};

use sptps::prelude::LongTermKeypair;

/// Application record type this demo uses for echo payloads; any value
/// below `HANDSHAKE_RECORD_TYPE` would do.
pub(crate) const ECHO_RECORD_TYPE: u8 = 1;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Well-known test seed for the side acting as server under `SPTPS_TEST_MODE`.
const TEST_SERVER_SEED: [u8; 32] = [0x51; 32];
/// Well-known test seed for the side acting as client under `SPTPS_TEST_MODE`.
const TEST_CLIENT_SEED: [u8; 32] = [0x52; 32];

fn encode_base64(data: &[u8]) -> String {
    let mut output = String::with_capacity((data.len() + 2) / 3 * 4);
    for chunk in data.chunks(3) {
        let b0 = chunk[0] as usize;
        let b1 = chunk.get(1).copied().unwrap_or(0) as usize;
        let b2 = chunk.get(2).copied().unwrap_or(0) as usize;
        let combined = (b0 << 16) | (b1 << 8) | b2;
        output.push(ALPHABET[(combined >> 18) & 0x3F] as char);
        output.push(ALPHABET[(combined >> 12) & 0x3F] as char);
        output.push(if chunk.len() > 1 { ALPHABET[(combined >> 6) & 0x3F] as char } else { '=' });
        output.push(if chunk.len() > 2 { ALPHABET[combined & 0x3F] as char } else { '=' });
    }
    output
}

fn decode_base64(input: &str) -> Result<Vec<u8>, &'static str> {
    let input = input.trim().as_bytes();
    let mut output = Vec::with_capacity(input.len() * 3 / 4);
    let mut buffer = 0u32;
    let mut bits = 0u32;
    for &byte in input {
        if byte == b'=' {
            break;
        }
        let value = ALPHABET.iter().position(|&c| c == byte).ok_or("invalid base64")? as u32;
        buffer = (buffer << 6) | value;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            output.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }
    Ok(output)
}

fn parse_key32(env_var: &str) -> Option<[u8; 32]> {
    let b64 = env::var(env_var).ok()?;
    let bytes = decode_base64(&b64).ok()?;
    if bytes.len() != 32 {
        eprintln!("Warning: {env_var} has wrong length ({}), ignoring", bytes.len());
        return None;
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Some(key)
}

struct Identity {
    my_key: LongTermKeypair,
    peer_public: [u8; 32],
}

fn resolve_identity(is_server: bool) -> Identity {
    let test_mode = env::var("SPTPS_TEST_MODE").map(|v| v == "true" || v == "1").unwrap_or(false);
    if test_mode {
        eprintln!("WARNING: SPTPS_TEST_MODE well-known keys in use, do not use in production");
        let (my_seed, peer_seed) = if is_server { (TEST_SERVER_SEED, TEST_CLIENT_SEED) } else { (TEST_CLIENT_SEED, TEST_SERVER_SEED) };
        return Identity {
            my_key: LongTermKeypair::from_bytes(&my_seed),
            peer_public: LongTermKeypair::from_bytes(&peer_seed).public_key(),
        };
    }

    let my_key = match parse_key32("SPTPS_MY_PRIVATE_KEY") {
        Some(seed) => LongTermKeypair::from_bytes(&seed),
        None => {
            eprintln!("No SPTPS_MY_PRIVATE_KEY set, generating an ephemeral identity for this run");
            LongTermKeypair::generate()
        }
    };
    eprintln!("My public key (base64): {}", encode_base64(&my_key.public_key()));

    let peer_public = parse_key32("SPTPS_PEER_PUBLIC_KEY").unwrap_or_else(|| {
        eprintln!("No SPTPS_PEER_PUBLIC_KEY set, handshake will fail unless the peer also uses a zero key");
        [0u8; 32]
    });

    Identity { my_key, peer_public }
}

fn main() {
    let mode = env::var("SPTPS_MODE").unwrap_or_else(|_| "server".to_string());
    let transport = env::var("SPTPS_TRANSPORT").unwrap_or_else(|_| "tcp".to_string());
    let port: u16 = env::var("SPTPS_SERVER_PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(19999);

    eprintln!("SPTPS echo - mode: {mode}, transport: {transport}");

    let result = match mode.as_str() {
        "server" => run_server(&transport, port),
        "client" => run_client(&transport, port),
        other => {
            eprintln!("Unknown mode: {other}. Use 'server' or 'client'");
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}

fn run_server(transport: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr: SocketAddr = env::var("SPTPS_BIND_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| format!("0.0.0.0:{port}").parse().unwrap());
    let identity = resolve_identity(true);

    match transport {
        "udp" => server::serve_udp(bind_addr, identity.my_key, identity.peer_public),
        _ => server::serve_tcp(bind_addr, identity.my_key, identity.peer_public),
    }
}

fn run_client(transport: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let host = env::var("SPTPS_SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_addr = (host.as_str(), port)
        .to_socket_addrs()?
        .next()
        .ok_or("failed to resolve server address")?;
    let persistent = env::var("SPTPS_PERSISTENT").map(|v| v == "true" || v == "1").unwrap_or(false);
    let identity = resolve_identity(false);

    match transport {
        "udp" => client::run_udp(server_addr, identity.my_key, identity.peer_public),
        _ => client::run_tcp(server_addr, identity.my_key, identity.peer_public, persistent),
    }
}
