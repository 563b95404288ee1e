//! One-shot completion futures handed to callers.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

/// The eventual `bool` outcome of a session operation.
///
/// Resolves to `false` if the session discards the operation without an
/// outcome, which happens on hard failure and on disconnect.
#[derive(Debug)]
pub struct Completion {
    receiver: oneshot::Receiver<bool>,
}

impl Completion {
    /// Creates a sender/completion pair.
    pub(crate) fn channel() -> (oneshot::Sender<bool>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }

    /// Creates a completion that is already resolved.
    pub(crate) fn resolved(value: bool) -> Self {
        let (sender, completion) = Self::channel();
        let _ = sender.send(value);
        completion
    }
}

impl Future for Completion {
    type Output = bool;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(false))
    }
}
