//! # postrider
//!
//! An SMTP submission client (RFC 5321) built around an explicit protocol
//! state machine and pluggable protocol extensions.
//!
//! ## Features
//!
//! - **Event-driven state machine**: the session advances on server
//!   replies delivered by the transport; callers observe it through
//!   one-shot completion futures instead of errors
//! - **Protocol extensions**: registered by EHLO token, an extension can
//!   rewrite outgoing commands and interpose its own protocol stage
//!   between any two stages of the main conversation
//! - **Pluggable transports**: plain TCP and implicit TLS ship with the
//!   crate; anything that can move bytes can stand in
//! - **RFC 5321 data transfer**: CRLF normalization and dot-stuffing of
//!   the message body, bare-dot termination
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use postrider::{Client, Headers, TcpTransport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::new();
//!     client.configure(Arc::new(TcpTransport::new()));
//!
//!     if !client.connect("mail.example.com", 587).await {
//!         return;
//!     }
//!     if !client.ready_or_broken().await {
//!         return;
//!     }
//!
//!     let mut headers = Headers::new();
//!     headers.add("From", "<alex@example.com>");
//!     headers.add("To", "<bob@example.com>");
//!     headers.add("Subject", "Hello");
//!
//!     let delivered = client.send_mail(&headers, "Hi Bob!\r\n").await;
//!     println!("delivered: {delivered}");
//!
//!     client.disconnect();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`client`]: the session state machine and caller surface
//! - [`extension`]: the extension trait and the bundled AUTH PLAIN
//! - [`transport`]: transport traits plus TCP and TLS implementations
//! - [`parser`]: reply framing and parsing
//! - [`types`]: protocol stages and reply records
//! - [`headers`], [`body`]: message material

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod body;
pub mod client;
mod error;
pub mod extension;
pub mod headers;
pub mod parser;
pub mod transport;
pub mod types;

pub use client::{Client, Completion};
pub use error::{Error, Result};
pub use extension::{AuthPlain, Extension, ExtensionActions};
pub use headers::Headers;
pub use transport::{Connection, TcpTransport, TlsTransport, Transport};
pub use types::{MessageContext, ProtocolStage, Reply, ReplyCode};
