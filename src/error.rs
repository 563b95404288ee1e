//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP client error types.
///
/// Protocol failures during a session are not reported through this type;
/// they resolve the session's completion futures instead. `Error` is
/// produced at the transport boundary and by the reply parser.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Connection attempt did not finish within the configured timeout.
    #[error("connection timed out")]
    Timeout,

    /// Hostname not usable as a TLS server name.
    #[error("invalid hostname: {0}")]
    InvalidHostname(String),

    /// CA bundle contained no parseable certificate.
    #[error("CA bundle contains no certificates")]
    EmptyCaBundle,

    /// Server reply line that does not follow the reply grammar.
    #[error("malformed reply line: {0}")]
    MalformedReply(String),
}
