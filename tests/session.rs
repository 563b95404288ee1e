//! End-to-end sessions against scripted servers on real sockets.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

use postrider::{Client, Headers, TcpTransport, TlsTransport};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

async fn read_line<S>(stream: &mut S) -> String
where
    S: AsyncRead + Unpin,
{
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).await.expect("read failed");
        assert!(n > 0, "peer closed while reading a line");
        line.push(byte[0]);
        if line.ends_with(b"\r\n") {
            break;
        }
    }
    String::from_utf8(line).expect("non-UTF-8 line")
}

async fn expect_line<S>(stream: &mut S, expected: &str)
where
    S: AsyncRead + Unpin,
{
    let line = read_line(stream).await;
    assert_eq!(line, format!("{expected}\r\n"));
}

async fn send<S>(stream: &mut S, data: &str)
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(data.as_bytes()).await.expect("write failed");
}

#[tokio::test]
async fn tcp_session_delivers_a_message_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        send(&mut stream, "220 mail.example.com SMTP Ready\r\n").await;
        expect_line(&mut stream, "EHLO [127.0.0.1]").await;
        send(
            &mut stream,
            "250-mail.example.com Hello\r\n250-8BITMIME\r\n250 HELP\r\n",
        )
        .await;
        expect_line(&mut stream, "MAIL FROM:<alex@example.com>").await;
        send(&mut stream, "250 OK\r\n").await;
        expect_line(&mut stream, "RCPT TO:<bob@example.com>").await;
        send(&mut stream, "250 OK\r\n").await;
        expect_line(&mut stream, "DATA").await;
        send(&mut stream, "354 Start mail input; end with <CRLF>.<CRLF>\r\n").await;
        let mut payload = String::new();
        loop {
            let line = read_line(&mut stream).await;
            if line == ".\r\n" {
                break;
            }
            payload.push_str(&line);
        }
        send(&mut stream, "250 OK\r\n").await;
        payload
    });

    let client = Client::new();
    client.configure(Arc::new(TcpTransport::new()));
    assert!(client.connect("127.0.0.1", port).await);
    assert!(timeout(TEST_TIMEOUT, client.ready_or_broken()).await.unwrap());

    let mut headers = Headers::new();
    headers.add("From", "<alex@example.com>");
    headers.add("To", "<bob@example.com>");
    headers.add("Subject", "Greetings");
    let body = "Have you heard of food.exe?  admEJ\nThat was a great game!\n";
    let delivered = timeout(TEST_TIMEOUT, client.send_mail(&headers, body))
        .await
        .unwrap();
    assert!(delivered);

    let payload = timeout(TEST_TIMEOUT, server).await.unwrap().unwrap();
    assert_eq!(
        payload,
        "From: <alex@example.com>\r\nTo: <bob@example.com>\r\nSubject: Greetings\r\n\r\n\
         Have you heard of food.exe?  admEJ\r\nThat was a great game!\r\n"
    );

    client.disconnect();
}

#[tokio::test]
async fn tcp_session_dot_stuffs_the_body_on_the_wire() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        send(&mut stream, "220 ok\r\n").await;
        expect_line(&mut stream, "EHLO [127.0.0.1]").await;
        send(&mut stream, "250 HELP\r\n").await;
        expect_line(&mut stream, "MAIL FROM:<alex@example.com>").await;
        send(&mut stream, "250 OK\r\n").await;
        expect_line(&mut stream, "RCPT TO:<bob@example.com>").await;
        send(&mut stream, "250 OK\r\n").await;
        expect_line(&mut stream, "DATA").await;
        send(&mut stream, "354 go\r\n").await;
        // Header block, then the stuffed body, then the terminator.
        loop {
            if read_line(&mut stream).await == "\r\n" {
                break;
            }
        }
        expect_line(&mut stream, "Line1").await;
        expect_line(&mut stream, "..").await;
        expect_line(&mut stream, "Line2").await;
        expect_line(&mut stream, ".").await;
        send(&mut stream, "250 OK\r\n").await;
    });

    let client = Client::new();
    client.configure(Arc::new(TcpTransport::new()));
    assert!(client.connect("127.0.0.1", port).await);
    assert!(timeout(TEST_TIMEOUT, client.ready_or_broken()).await.unwrap());

    let mut headers = Headers::new();
    headers.add("From", "<alex@example.com>");
    headers.add("To", "<bob@example.com>");
    let delivered = timeout(
        TEST_TIMEOUT,
        client.send_mail(&headers, "Line1\r\n.\r\nLine2\r\n"),
    )
    .await
    .unwrap();
    assert!(delivered);

    timeout(TEST_TIMEOUT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn connect_to_dead_port_resolves_false() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = Client::new();
    client.configure(Arc::new(
        TcpTransport::new().connect_timeout(Duration::from_secs(2)),
    ));
    assert!(!client.connect("127.0.0.1", port).await);
}

fn self_signed_localhost() -> (rcgen::CertifiedKey, rustls::ServerConfig) {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_der = certified.cert.der().clone();
    let key_der =
        rustls::pki_types::PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der());
    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der.into())
        .unwrap();
    (certified, config)
}

#[tokio::test]
async fn tls_connect_with_matching_ca_bundle_succeeds() {
    let (certified, server_config) = self_signed_localhost();
    let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(server_config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accepted = Arc::new(AtomicUsize::new(0));
    let accepted_by_server = Arc::clone(&accepted);

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        accepted_by_server.fetch_add(1, Ordering::SeqCst);
        let mut stream = acceptor.accept(tcp).await.unwrap();
        send(&mut stream, "220 mail.example.com SMTP Ready\r\n").await;
        expect_line(&mut stream, "EHLO [127.0.0.1]").await;
        send(&mut stream, "250 HELP\r\n").await;
        // Hold the session open until the client hangs up.
        let mut buf = [0u8; 32];
        let _ = stream.read(&mut buf).await;
    });

    let transport = TlsTransport::with_ca_pem(certified.cert.pem().as_bytes()).unwrap();
    let client = Client::new();
    client.configure(Arc::new(transport));
    assert!(client.connect("localhost", port).await);
    assert!(timeout(TEST_TIMEOUT, client.ready_or_broken()).await.unwrap());
    assert_eq!(accepted.load(Ordering::SeqCst), 1);

    client.disconnect();
    timeout(TEST_TIMEOUT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn tls_connect_with_untrusted_server_resolves_false() {
    let (_certified, server_config) = self_signed_localhost();
    let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(server_config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        // The handshake fails because the client does not trust us.
        let _ = acceptor.accept(tcp).await;
    });

    let client = Client::new();
    client.configure(Arc::new(TlsTransport::new()));
    assert!(!client.connect("localhost", port).await);
    timeout(TEST_TIMEOUT, server).await.unwrap().unwrap();
}
