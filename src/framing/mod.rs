//! Record framing for stream and datagram transports (§4.1).

pub mod datagram;
pub mod stream;

pub use crate::core::{HANDSHAKE_RECORD_TYPE, is_application_record};
