//! Transport abstraction between the client and the network.
//!
//! The session core never touches sockets directly: it asks a
//! [`Transport`] for a [`Connection`] and talks to that. Two transports
//! ship with the crate, plain TCP ([`TcpTransport`]) and implicit TLS
//! ([`TlsTransport`]); anything that can move bytes and report a close
//! event can stand in for them, which is also how the tests drive the
//! client against a scripted peer.

mod conn;
mod tcp;
mod tls;

pub use tcp::TcpTransport;
pub use tls::TlsTransport;

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Callback invoked with each chunk of bytes read from the server.
pub type BytesHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Callback invoked once when the connection stops delivering bytes. The
/// flag is `true` for an orderly close and `false` for an abrupt one.
pub type CloseHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// Opens network connections to SMTP servers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connects to `host:port`, performing whatever stream setup the
    /// transport is responsible for, such as a TLS handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection could not be established.
    async fn connect(&self, host: &str, port: u16) -> Result<Arc<dyn Connection>>;
}

/// A live connection to an SMTP server.
pub trait Connection: Send + Sync {
    /// Starts delivering inbound bytes and the close event to the given
    /// callbacks. Returns `false` if processing could not start.
    fn process(&self, on_bytes: BytesHandler, on_close: CloseHandler) -> bool;

    /// Queues bytes for transmission. Never blocks.
    fn send(&self, data: &[u8]);

    /// Stops the connection. Closing is idempotent.
    fn close(&self, graceful: bool);

    /// The local IPv4 address the connection is bound to, used for the
    /// EHLO address literal. Connections bound to an IPv6 address report
    /// `0.0.0.0`.
    fn bound_address(&self) -> Ipv4Addr;
}
