//! Pluggable SMTP extensions.
//!
//! An extension is registered on the [`Client`](crate::Client) under the
//! token the server uses in its EHLO option list. When the server
//! advertises that token, the extension becomes *supported* for the rest
//! of the connection and can:
//!
//! - rewrite outgoing commands via [`Extension::modify_message`];
//! - interpose its own protocol stage between any two stages of the main
//!   conversation via [`Extension::needs_extra_stage`] /
//!   [`Extension::go_ahead`];
//! - judge the server replies addressed to it via
//!   [`Extension::handle_server_reply`].
//!
//! Every method has a default implementation, so an implementation only
//! overrides the hooks it needs.

mod auth;

pub use auth::AuthPlain;

use crate::types::{MessageContext, Reply};

/// Deferred effects an extension asks the client to apply.
///
/// The client hands one of these to [`Extension::go_ahead`] and
/// [`Extension::handle_server_reply`] and applies the queued effects as
/// soon as the call returns: raw sends first, then the stage verdict.
/// Deferring the effects keeps extension callbacks free of any session
/// locking concerns.
#[derive(Debug, Default)]
pub struct ExtensionActions {
    pub(crate) outgoing: Vec<Vec<u8>>,
    pub(crate) verdict: Option<bool>,
}

impl ExtensionActions {
    /// Queues bytes to send to the server verbatim. Each line must end
    /// with CRLF. The bytes bypass [`Extension::modify_message`] and are
    /// not logged.
    pub fn send_raw(&mut self, data: impl Into<Vec<u8>>) {
        self.outgoing.push(data.into());
    }

    /// Declares the extension's sub-stage finished.
    ///
    /// `true` lets the session proceed with the stage it was entering;
    /// `false` fails the in-flight send and returns the session to the
    /// ready stage.
    pub fn complete_stage(&mut self, success: bool) {
        self.verdict = Some(success);
    }
}

/// A pluggable SMTP extension.
pub trait Extension: Send {
    /// Receives the parameters the server advertised after the
    /// extension's token in its EHLO option list.
    fn configure(&mut self, parameters: &str) {
        let _ = parameters;
    }

    /// Called at the start of every connection attempt, whether or not
    /// the server ends up advertising the extension.
    fn reset(&mut self) {}

    /// Gives the extension the chance to rewrite an outgoing command.
    /// Neither `input` nor the returned line carries a trailing CRLF.
    fn modify_message(&mut self, context: &MessageContext, input: &str) -> String {
        let _ = context;
        input.to_string()
    }

    /// Asks whether the extension wants to run its own protocol stage at
    /// the point the session just reached.
    fn needs_extra_stage(&mut self, context: &MessageContext) -> bool {
        let _ = context;
        false
    }

    /// Tells the extension to run the stage it asked for.
    fn go_ahead(&mut self, actions: &mut ExtensionActions) {
        let _ = actions;
    }

    /// Delivers a server reply while the extension's stage is active.
    ///
    /// Return `false` to declare the reply unacceptable; the client
    /// treats that as fatal and drops the connection.
    fn handle_server_reply(
        &mut self,
        context: &MessageContext,
        reply: &Reply,
        actions: &mut ExtensionActions,
    ) -> bool {
        let _ = (context, reply, actions);
        false
    }
}
