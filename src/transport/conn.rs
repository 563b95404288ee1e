//! Stream-backed connection shared by the TCP and TLS transports.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Mutex;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{BytesHandler, CloseHandler, Connection};

const READ_BUFFER_SIZE: usize = 8192;

/// Connection over any async byte stream.
///
/// `process` splits the stream and spawns one reader task, which feeds
/// the byte and close callbacks, and one writer task, which drains the
/// unbounded send queue. `send` only enqueues, so it is safe to call
/// from non-async code paths.
pub(crate) struct StreamConnection<S> {
    local_addr: SocketAddr,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
    state: Mutex<State<S>>,
}

struct State<S> {
    stream: Option<S>,
    outgoing_rx: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl<S> StreamConnection<S> {
    pub(crate) fn new(stream: S, local_addr: SocketAddr) -> Self {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        Self {
            local_addr,
            outgoing,
            state: Mutex::new(State {
                stream: Some(stream),
                outgoing_rx: Some(outgoing_rx),
                reader: None,
                writer: None,
            }),
        }
    }
}

impl<S> Connection for StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    fn process(&self, on_bytes: BytesHandler, on_close: CloseHandler) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let (Some(stream), Some(mut outgoing_rx)) = (state.stream.take(), state.outgoing_rx.take())
        else {
            return false;
        };
        let (mut read_half, mut write_half) = tokio::io::split(stream);
        state.writer = Some(tokio::spawn(async move {
            while let Some(chunk) = outgoing_rx.recv().await {
                if write_half.write_all(&chunk).await.is_err() {
                    break;
                }
                if write_half.flush().await.is_err() {
                    break;
                }
            }
            let _ = write_half.shutdown().await;
        }));
        state.reader = Some(tokio::spawn(async move {
            let mut buf = vec![0u8; READ_BUFFER_SIZE];
            loop {
                match read_half.read(&mut buf).await {
                    Ok(0) => {
                        on_close(true);
                        break;
                    }
                    Ok(n) => on_bytes(&buf[..n]),
                    Err(_) => {
                        on_close(false);
                        break;
                    }
                }
            }
        }));
        true
    }

    fn send(&self, data: &[u8]) {
        let _ = self.outgoing.send(data.to_vec());
    }

    fn close(&self, graceful: bool) {
        tracing::debug!(graceful, "closing connection");
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.stream = None;
        if let Some(reader) = state.reader.take() {
            reader.abort();
        }
        if let Some(writer) = state.writer.take() {
            writer.abort();
        }
    }

    fn bound_address(&self) -> Ipv4Addr {
        match self.local_addr {
            SocketAddr::V4(v4) => *v4.ip(),
            SocketAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::io::duplex;
    use tokio::sync::mpsc::unbounded_channel;

    fn local_addr() -> SocketAddr {
        "127.0.0.1:2525".parse().unwrap()
    }

    #[tokio::test]
    async fn delivers_inbound_bytes_to_the_callback() {
        let (near, mut far) = duplex(256);
        let connection = StreamConnection::new(near, local_addr());
        let (bytes_tx, mut bytes_rx) = unbounded_channel();
        let on_bytes: BytesHandler = Arc::new(move |data: &[u8]| {
            let _ = bytes_tx.send(data.to_vec());
        });
        let on_close: CloseHandler = Arc::new(|_| {});
        assert!(connection.process(on_bytes, on_close));

        far.write_all(b"220 ready\r\n").await.unwrap();
        let received = bytes_rx.recv().await.unwrap();
        assert_eq!(received, b"220 ready\r\n");
    }

    #[tokio::test]
    async fn writes_queued_bytes_to_the_stream() {
        let (near, mut far) = duplex(256);
        let connection = StreamConnection::new(near, local_addr());
        // Queued before processing starts, flushed once it does.
        connection.send(b"EHLO [127.0.0.1]\r\n");
        let on_bytes: BytesHandler = Arc::new(|_| {});
        let on_close: CloseHandler = Arc::new(|_| {});
        assert!(connection.process(on_bytes, on_close));

        let mut buf = vec![0u8; 64];
        let n = far.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"EHLO [127.0.0.1]\r\n");
    }

    #[tokio::test]
    async fn peer_close_fires_the_close_callback() {
        let (near, far) = duplex(256);
        let connection = StreamConnection::new(near, local_addr());
        let closed = Arc::new(AtomicBool::new(false));
        let closed_flag = Arc::clone(&closed);
        let (done_tx, mut done_rx) = unbounded_channel();
        let on_bytes: BytesHandler = Arc::new(|_| {});
        let on_close: CloseHandler = Arc::new(move |graceful| {
            closed_flag.store(graceful, Ordering::SeqCst);
            let _ = done_tx.send(());
        });
        assert!(connection.process(on_bytes, on_close));

        drop(far);
        done_rx.recv().await.unwrap();
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn process_runs_only_once() {
        let (near, _far) = duplex(256);
        let connection = StreamConnection::new(near, local_addr());
        let on_bytes: BytesHandler = Arc::new(|_| {});
        let on_close: CloseHandler = Arc::new(|_| {});
        assert!(connection.process(Arc::clone(&on_bytes), Arc::clone(&on_close)));
        assert!(!connection.process(on_bytes, on_close));
    }

    #[test]
    fn ipv6_bound_address_degrades_to_unspecified() {
        let (near, _far) = duplex(16);
        let connection = StreamConnection::new(near, "[::1]:2525".parse().unwrap());
        assert_eq!(connection.bound_address(), Ipv4Addr::UNSPECIFIED);
    }
}
