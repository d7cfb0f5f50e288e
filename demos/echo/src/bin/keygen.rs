//! SPTPS identity key generation utility.
//!
//! Generates an Ed25519 long-term identity keypair for the echo demo's
//! `SPTPS_MY_PRIVATE_KEY` / `SPTPS_PEER_PUBLIC_KEY` environment variables.

use sptps::prelude::LongTermKeypair;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

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

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("sptps keygen");
        println!();
        println!("Generates a fresh Ed25519 identity keypair for the SPTPS echo demo.");
        println!("Usage: keygen");
        return;
    }

    let keypair = LongTermKeypair::generate();
    let private_b64 = encode_base64(&keypair.to_bytes());
    let public_b64 = encode_base64(&keypair.public_key());

    println!("Generated a fresh SPTPS identity.");
    println!();
    println!("Private key (base64) - keep secret, set as SPTPS_MY_PRIVATE_KEY:");
    println!("{private_b64}");
    println!();
    println!("Public key (base64) - give to the peer, who sets it as their SPTPS_PEER_PUBLIC_KEY:");
    println!("{public_b64}");
}
