//! Protocol stage tracking.

/// Progression of the conversation with the SMTP server.
///
/// The client enters [`Greeting`](Self::Greeting) as soon as a connection
/// is established and only accepts a new submission while in
/// [`ReadyToSend`](Self::ReadyToSend).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolStage {
    /// Waiting for the server's 220 banner.
    #[default]
    Greeting,

    /// Waiting for the server to respond to the client's EHLO.
    ///
    /// Reached only when an extension interposes between the greeting and
    /// the option list; the normal path goes straight to [`Options`](Self::Options).
    HelloResponse,

    /// Collecting the multi-line list of options the server supports.
    Options,

    /// Ready to start the next mail transaction.
    ReadyToSend,

    /// Waiting for the server to accept the sender address.
    DeclaringSender,

    /// Waiting for the server to accept the recipient addresses.
    DeclaringRecipients,

    /// Waiting for the go-ahead to transmit the message content.
    SendingData,

    /// Waiting for the final verdict on the transmitted message.
    AwaitingSendResponse,
}

/// State shared between the protocol handler and any extensions.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageContext {
    /// Current stage of the conversation.
    pub stage: ProtocolStage,
}
