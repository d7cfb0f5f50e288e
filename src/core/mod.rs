//! Core types shared by every other module: wire constants, the error
//! enum, and the pluggable logging hook.

mod constants;
mod error;
mod log;

pub use constants::*;
pub use error::*;
pub use log::{LogLevel, Logger, NullLogger, StderrLogger, sptps_log};
