//! Cipher abstraction, key-exchange primitives, and the PRF (§4.2, §4.3's
//! key sizes, §4.7).

mod cipher;
mod keys;
mod prf;
mod suite;

pub use cipher::CipherContext;
pub use keys::{EphemeralKeypair, LongTermKeypair, ecdsa_size, verify};
pub use prf::derive_key_material;
pub use suite::{AES_256_GCM, CHACHA20_POLY1305, CipherSuite, all_supported_mask, negotiate};
