//! The SMTP submission client.
//!
//! A [`Client`] drives one logical SMTP session at a time over a
//! [`Transport`] it is configured with. The conversation is an explicit
//! state machine fed by the transport's inbound-byte callback; callers
//! observe it through one-shot [`Completion`] futures rather than through
//! errors: [`Client::connect`] resolves when the connection attempt
//! finishes, [`Client::ready_or_broken`] when the session is ready for a
//! submission (or dead), and [`Client::send_mail`] when the server has
//! accepted or rejected the message.
//!
//! Registered [`Extension`]s take part in the conversation: each outgoing
//! transaction command passes through the supported extensions'
//! `modify_message` hooks in advertisement order, and at every stage
//! transition each supported extension may claim an extra protocol stage
//! of its own, during which server replies are routed to it exclusively.

mod completion;

pub use completion::Completion;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::oneshot;

use crate::body::normalize_body;
use crate::extension::{Extension, ExtensionActions};
use crate::headers::Headers;
use crate::parser::{LineAssembler, parse_reply_line};
use crate::transport::{BytesHandler, CloseHandler, Connection, Transport};
use crate::types::{MessageContext, ProtocolStage, Reply, ReplyCode};

/// Client for submitting mail through an SMTP server.
///
/// ```no_run
/// use std::sync::Arc;
/// use postrider::{Client, Headers, TcpTransport};
///
/// # async fn example() {
/// let client = Client::new();
/// client.configure(Arc::new(TcpTransport::new()));
/// assert!(client.connect("mail.example.com", 587).await);
/// assert!(client.ready_or_broken().await);
///
/// let mut headers = Headers::new();
/// headers.add("From", "<alex@example.com>");
/// headers.add("To", "<bob@example.com>");
/// headers.add("Subject", "Hello");
/// let delivered = client.send_mail(&headers, "Hi Bob!\r\n").await;
/// # let _ = delivered;
/// # }
/// ```
pub struct Client {
    inner: Arc<Mutex<Inner>>,
}

struct RegisteredExtension {
    name: String,
    implementation: Box<dyn Extension>,
}

#[derive(Default)]
struct Inner {
    transport: Option<Arc<dyn Transport>>,
    connection: Option<Arc<dyn Connection>>,
    /// Registered extensions, in registration order.
    extensions: Vec<RegisteredExtension>,
    /// Names the server advertised and the client has registered, in
    /// advertisement order.
    supported: Vec<String>,
    context: MessageContext,
    /// Index into `extensions` of the extension currently running its own
    /// protocol stage, if any. While set, server replies go to it alone.
    active_extension: Option<usize>,
    assembler: LineAssembler,
    headers: Headers,
    body: String,
    recipients: VecDeque<String>,
    ready_waiters: Vec<oneshot::Sender<bool>>,
    send_completed: Option<oneshot::Sender<bool>>,
}

impl Client {
    /// Creates a client with no transport bound.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Binds the transport used by subsequent [`connect`](Self::connect)
    /// calls.
    pub fn configure(&self, transport: Arc<dyn Transport>) {
        self.lock().transport = Some(transport);
    }

    /// Registers an extension under the token the server advertises it
    /// with in its EHLO option list. Registering a token twice replaces
    /// the implementation in place.
    pub fn register_extension(&self, name: impl Into<String>, extension: Box<dyn Extension>) {
        let name = name.into();
        let mut inner = self.lock();
        if let Some(slot) = inner.extensions.iter_mut().find(|slot| slot.name == name) {
            slot.implementation = extension;
        } else {
            inner.extensions.push(RegisteredExtension {
                name,
                implementation: extension,
            });
        }
    }

    /// Connects to the SMTP server at `server_host:server_port`.
    ///
    /// Every registered extension is reset, whether or not the server
    /// will end up advertising it, and the session state is cleared.
    /// Returns `true` once the connection is established and inbound
    /// processing has started. No SMTP command is sent; the session waits
    /// in the greeting stage for the server banner.
    pub async fn connect(&self, server_host: &str, server_port: u16) -> bool {
        let transport = {
            let mut inner = self.lock();
            if let Some(previous) = inner.connection.take() {
                previous.close(true);
            }
            for slot in &mut inner.extensions {
                slot.implementation.reset();
            }
            inner.supported.clear();
            inner.context = MessageContext::default();
            inner.assembler.clear();
            inner.active_extension = None;
            inner.transport.clone()
        };
        let Some(transport) = transport else {
            tracing::warn!("no transport configured");
            return false;
        };
        let connection = match transport.connect(server_host, server_port).await {
            Ok(connection) => connection,
            Err(error) => {
                tracing::warn!(
                    %error,
                    host = server_host,
                    port = server_port,
                    "unable to connect to SMTP server"
                );
                return false;
            }
        };
        let weak = Arc::downgrade(&self.inner);
        let on_bytes: BytesHandler = {
            let weak = Weak::clone(&weak);
            Arc::new(move |data: &[u8]| {
                if let Some(inner) = weak.upgrade() {
                    lock_inner(&inner).on_bytes(data);
                }
            })
        };
        let on_close: CloseHandler = Arc::new(move |graceful: bool| {
            if let Some(inner) = weak.upgrade() {
                tracing::debug!(graceful, "connection closed by peer");
                lock_inner(&inner).on_hard_failure();
            }
        });
        let mut inner = self.lock();
        inner.connection = Some(Arc::clone(&connection));
        connection.process(on_bytes, on_close)
    }

    /// Closes the connection, drops it, and resets the protocol context.
    ///
    /// Outstanding [`ready_or_broken`](Self::ready_or_broken) waiters and
    /// any pending send completion resolve to `false`.
    pub fn disconnect(&self) {
        let mut inner = self.lock();
        if let Some(connection) = inner.connection.take() {
            connection.close(true);
        }
        inner.context = MessageContext::default();
        for waiter in inner.swap_out_ready_waiters() {
            let _ = waiter.send(false);
        }
        inner.send_completed = None;
    }

    /// Submits one message.
    ///
    /// The session must be in the ready stage and `headers` must carry a
    /// `From` header, otherwise the returned completion resolves to
    /// `false` immediately and nothing is sent. The `From` and `To`
    /// header values are inserted literally after `MAIL FROM:` and
    /// `RCPT TO:`, so supply them in angle-bracket form
    /// (`<user@example.com>`); the client does not rewrite addresses.
    ///
    /// The completion resolves to `true` once the server accepts the
    /// message, and to `false` if any step of the transaction is
    /// rejected (the connection stays usable) or the connection fails.
    pub fn send_mail(&self, headers: &Headers, body: &str) -> Completion {
        let mut inner = self.lock();
        // A new submission supersedes any in-flight completion.
        inner.send_completed = None;
        if inner.context.stage != ProtocolStage::ReadyToSend || !headers.has("From") {
            return Completion::resolved(false);
        }
        let (sender, completion) = Completion::channel();
        inner.send_completed = Some(sender);
        inner.headers = headers.clone();
        inner.body = normalize_body(body);
        let from = inner.headers.value("From").unwrap_or_default().to_string();
        inner.send_through_extensions(&format!("MAIL FROM:{from}"));
        inner.transition(ProtocolStage::DeclaringSender);
        completion
    }

    /// Returns a completion that resolves to `true` the next time the
    /// session becomes ready for a submission, and to `false` if the
    /// connection breaks first. Any number of waiters may be outstanding;
    /// they all resolve together.
    pub fn ready_or_broken(&self) -> Completion {
        let (sender, completion) = Completion::channel();
        self.lock().ready_waiters.push(sender);
        completion
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Client")
            .field("stage", &inner.context.stage)
            .field("connected", &inner.connection.is_some())
            .field("supported", &inner.supported)
            .finish_non_exhaustive()
    }
}

fn lock_inner(inner: &Arc<Mutex<Inner>>) -> MutexGuard<'_, Inner> {
    match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Inner {
    fn swap_out_ready_waiters(&mut self) -> Vec<oneshot::Sender<bool>> {
        std::mem::take(&mut self.ready_waiters)
    }

    fn on_ready(&mut self) {
        for waiter in self.swap_out_ready_waiters() {
            let _ = waiter.send(true);
        }
    }

    /// Unrecoverable failure: waiters resolve to `false`, the in-flight
    /// send (if any) is discarded, and the connection is dropped.
    fn on_hard_failure(&mut self) {
        for waiter in self.swap_out_ready_waiters() {
            let _ = waiter.send(false);
        }
        self.send_completed = None;
        if let Some(connection) = &self.connection {
            connection.close(false);
        }
    }

    /// The server rejected a step of the transaction but the connection
    /// is still good: fail the send and renegotiate readiness.
    fn on_soft_failure(&mut self) {
        if let Some(sender) = self.send_completed.take() {
            let _ = sender.send(false);
        }
        self.on_message_ready();
    }

    fn on_message_ready(&mut self) {
        self.transition(ProtocolStage::ReadyToSend);
    }

    fn extension_index(&self, name: &str) -> Option<usize> {
        self.extensions.iter().position(|slot| slot.name == name)
    }

    /// Moves the session to the next protocol stage, giving each
    /// supported extension, in advertisement order, the chance to run a
    /// stage of its own first. The ready signal fires only when the
    /// session reaches the ready stage with no extension claiming a turn.
    fn transition(&mut self, next: ProtocolStage) {
        self.active_extension = None;
        self.context.stage = next;
        for position in 0..self.supported.len() {
            let name = self.supported[position].clone();
            let Some(index) = self.extension_index(&name) else {
                continue;
            };
            if self.extensions[index]
                .implementation
                .needs_extra_stage(&self.context)
            {
                self.active_extension = Some(index);
                let mut actions = ExtensionActions::default();
                self.extensions[index].implementation.go_ahead(&mut actions);
                // A synchronous completion has already re-run transition.
                self.apply_extension_actions(actions);
                return;
            }
        }
        if self.context.stage == ProtocolStage::ReadyToSend {
            self.on_ready();
        }
    }

    fn on_extension_stage_complete(&mut self, success: bool) {
        if success {
            self.transition(self.context.stage);
        } else {
            self.on_soft_failure();
        }
    }

    fn apply_extension_actions(&mut self, actions: ExtensionActions) {
        for chunk in actions.outgoing {
            self.send_unlogged(&chunk);
        }
        if let Some(success) = actions.verdict {
            self.on_extension_stage_complete(success);
        }
    }

    fn send_unlogged(&mut self, data: &[u8]) {
        if let Some(connection) = &self.connection {
            connection.send(data);
        }
    }

    fn send_raw(&mut self, line: &str) {
        tracing::debug!("C: {}", line.strip_suffix("\r\n").unwrap_or(line));
        self.send_unlogged(line.as_bytes());
    }

    /// Folds the line through the supported extensions' `modify_message`
    /// hooks, appends the CRLF, and sends it.
    fn send_through_extensions(&mut self, line: &str) {
        let mut output = line.to_string();
        for position in 0..self.supported.len() {
            let name = self.supported[position].clone();
            let Some(index) = self.extension_index(&name) else {
                continue;
            };
            output = self.extensions[index]
                .implementation
                .modify_message(&self.context, &output);
        }
        self.send_raw(&format!("{output}\r\n"));
    }

    /// Entry point for inbound bytes from the transport.
    fn on_bytes(&mut self, data: &[u8]) {
        let lines = self.assembler.push(data);
        if lines.is_empty() {
            return;
        }
        let mut replies = Vec::with_capacity(lines.len());
        for line in &lines {
            if self.active_extension.is_none() {
                tracing::debug!("S: {}", line.strip_suffix("\r\n").unwrap_or(line));
            }
            match parse_reply_line(line) {
                Ok(reply) => replies.push(reply),
                Err(error) => {
                    tracing::warn!(%error, "dropping connection");
                    self.on_hard_failure();
                    return;
                }
            }
        }
        for reply in replies {
            if !self.dispatch_reply(&reply) {
                return;
            }
        }
    }

    /// Routes one reply. Returns `false` when the rest of the inbound
    /// batch must be abandoned because the session failed.
    fn dispatch_reply(&mut self, reply: &Reply) -> bool {
        if let Some(index) = self.active_extension {
            let mut actions = ExtensionActions::default();
            let accepted = self.extensions[index].implementation.handle_server_reply(
                &self.context,
                reply,
                &mut actions,
            );
            if accepted {
                self.apply_extension_actions(actions);
                return true;
            }
            self.on_hard_failure();
            return false;
        }
        match self.context.stage {
            ProtocolStage::Greeting => {
                if reply.code == ReplyCode::SERVICE_READY {
                    let address = self
                        .connection
                        .as_ref()
                        .map_or(std::net::Ipv4Addr::UNSPECIFIED, |connection| {
                            connection.bound_address()
                        });
                    self.send_raw(&format!("EHLO [{address}]\r\n"));
                    self.transition(ProtocolStage::Options);
                    true
                } else {
                    self.on_hard_failure();
                    false
                }
            }
            ProtocolStage::HelloResponse => {
                if reply.code == ReplyCode::OK {
                    if reply.last {
                        self.on_message_ready();
                    } else {
                        self.transition(ProtocolStage::Options);
                    }
                    true
                } else {
                    self.on_hard_failure();
                    false
                }
            }
            ProtocolStage::Options => {
                if reply.code == ReplyCode::OK {
                    let (token, parameters) = match reply.text.split_once(' ') {
                        Some((token, rest)) => (token, rest),
                        None => (reply.text.as_str(), ""),
                    };
                    if let Some(index) = self.extension_index(token) {
                        if !self.supported.iter().any(|name| name == token) {
                            self.supported.push(token.to_string());
                        }
                        self.extensions[index].implementation.configure(parameters);
                    }
                    if reply.last {
                        self.on_message_ready();
                    }
                    true
                } else {
                    self.on_hard_failure();
                    false
                }
            }
            ProtocolStage::DeclaringSender => {
                if reply.code == ReplyCode::OK {
                    let recipients: Vec<String> = self
                        .headers
                        .values("To")
                        .into_iter()
                        .map(str::to_string)
                        .collect();
                    self.recipients.extend(recipients);
                    self.transition(ProtocolStage::DeclaringRecipients);
                    self.announce_next_recipient();
                    true
                } else {
                    self.on_soft_failure();
                    false
                }
            }
            ProtocolStage::DeclaringRecipients => {
                if reply.code == ReplyCode::OK {
                    self.announce_next_recipient();
                    true
                } else {
                    self.on_soft_failure();
                    false
                }
            }
            ProtocolStage::SendingData => {
                if reply.code == ReplyCode::START_DATA {
                    self.transition(ProtocolStage::AwaitingSendResponse);
                    let header_block = self.headers.to_wire();
                    self.send_raw(&header_block);
                    let body = std::mem::take(&mut self.body);
                    if !body.is_empty() {
                        self.send_raw(&body);
                        if !body.ends_with("\r\n") {
                            self.send_raw("\r\n");
                        }
                    }
                    self.send_raw(".\r\n");
                    true
                } else {
                    self.on_soft_failure();
                    false
                }
            }
            ProtocolStage::AwaitingSendResponse => {
                if let Some(sender) = self.send_completed.take() {
                    let _ = sender.send(reply.code == ReplyCode::OK);
                }
                self.on_message_ready();
                true
            }
            ProtocolStage::ReadyToSend => {
                // Nothing is expected from the server here.
                self.on_hard_failure();
                false
            }
        }
    }

    /// Declares the next queued recipient, or moves on to the data
    /// transfer when the queue is drained.
    fn announce_next_recipient(&mut self) {
        match self.recipients.pop_front() {
            Some(recipient) => self.send_through_extensions(&format!("RCPT TO:{recipient}")),
            None => {
                self.send_through_extensions("DATA");
                self.transition(ProtocolStage::SendingData);
            }
        }
    }
}
