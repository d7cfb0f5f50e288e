//! Session-scoped logging hook.
//!
//! The reference implementation's logger is a process-global function
//! pointer; per the design note that a reimplementation should prefer
//! session-scoped configuration, here it is a `Box<dyn Logger>` held by
//! each [`crate::Session`].

use std::fmt;

use super::SptpsError;

/// Severity of a log call, mirroring the reference's `errno`-style
/// classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// A condition a caller likely wants to know about but that is not an
    /// error (e.g. a rate-limited replay drop).
    Info,
    /// An operation failed; the triggering [`SptpsError`] is attached.
    Error,
}

/// A session's logging sink.
///
/// Implementations must not re-enter the session that owns them (same
/// non-reentrancy rule as the transport callbacks).
pub trait Logger: Send {
    /// Receives one log event.
    fn log(&self, level: LogLevel, error: Option<&SptpsError>, message: fmt::Arguments<'_>);
}

/// Discards everything. The default for a new session.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: LogLevel, _error: Option<&SptpsError>, _message: fmt::Arguments<'_>) {}
}

/// Writes `[LEVEL] message: error` lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLogger;

impl Logger for StderrLogger {
    fn log(&self, level: LogLevel, error: Option<&SptpsError>, message: fmt::Arguments<'_>) {
        let tag = match level {
            LogLevel::Info => "INFO",
            LogLevel::Error => "ERROR",
        };
        match error {
            Some(err) => eprintln!("[{tag}] {message}: {err}"),
            None => eprintln!("[{tag}] {message}"),
        }
    }
}

/// Convenience macro mirroring the reference's `log(session, errno, fmt, ...)`
/// call shape without requiring callers to build `fmt::Arguments` by hand.
macro_rules! sptps_log {
    ($logger:expr, $level:expr, $err:expr, $($arg:tt)*) => {
        $logger.log($level, $err, format_args!($($arg)*))
    };
}

pub(crate) use sptps_log;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_logger_accepts_any_call() {
        let logger = NullLogger;
        sptps_log!(logger, LogLevel::Info, None, "handshake started");
        sptps_log!(
            logger,
            LogLevel::Error,
            Some(&SptpsError::MisuseError("send before handshake")),
            "rejected record"
        );
    }

    #[test]
    fn log_level_ordering() {
        assert!(LogLevel::Info < LogLevel::Error);
    }
}
