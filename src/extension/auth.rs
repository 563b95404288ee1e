//! SASL PLAIN authentication as a protocol extension.

use base64::Engine;

use super::{Extension, ExtensionActions};
use crate::types::{MessageContext, ProtocolStage, Reply, ReplyCode};

/// Authenticates with `AUTH PLAIN` once per connection, before the first
/// send.
///
/// Register it under the `AUTH` token. When the server's option list
/// offers the `PLAIN` mechanism, the extension interposes at the ready
/// stage, submits the base64-encoded `\0user\0password` response, and
/// completes on 235. A credential rejection (535) or temporary failure
/// (454) fails the stage without dropping the connection; any other
/// reply is fatal.
///
/// ```
/// use postrider::{AuthPlain, Client};
///
/// let client = Client::new();
/// client.register_extension("AUTH", Box::new(AuthPlain::new("alice", "swordfish")));
/// ```
#[derive(Debug)]
pub struct AuthPlain {
    username: String,
    password: String,
    mechanisms: Vec<String>,
    attempted: bool,
}

impl AuthPlain {
    /// Creates the extension with the credentials to present.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            mechanisms: Vec::new(),
            attempted: false,
        }
    }
}

impl Extension for AuthPlain {
    fn configure(&mut self, parameters: &str) {
        self.mechanisms = parameters
            .split_whitespace()
            .map(str::to_uppercase)
            .collect();
    }

    fn reset(&mut self) {
        self.mechanisms.clear();
        self.attempted = false;
    }

    fn needs_extra_stage(&mut self, context: &MessageContext) -> bool {
        if self.attempted
            || context.stage != ProtocolStage::ReadyToSend
            || !self.mechanisms.iter().any(|mechanism| mechanism == "PLAIN")
        {
            return false;
        }
        self.attempted = true;
        true
    }

    fn go_ahead(&mut self, actions: &mut ExtensionActions) {
        let credentials = format!("\0{}\0{}", self.username, self.password);
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
        actions.send_raw(format!("AUTH PLAIN {encoded}\r\n"));
    }

    fn handle_server_reply(
        &mut self,
        _context: &MessageContext,
        reply: &Reply,
        actions: &mut ExtensionActions,
    ) -> bool {
        match reply.code {
            ReplyCode::AUTH_SUCCEEDED => {
                actions.complete_stage(true);
                true
            }
            ReplyCode::AUTH_FAILED | ReplyCode::TEMP_AUTH_FAILURE => {
                actions.complete_stage(false);
                true
            }
            _ => false,
        }
    }
}
