//! Implicit-TLS transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

use super::conn::StreamConnection;
use super::{Connection, Transport};
use crate::error::{Error, Result};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport that wraps every connection in TLS during connect
/// (implicit TLS, as on port 465).
#[derive(Clone)]
pub struct TlsTransport {
    connector: TlsConnector,
    connect_timeout: Duration,
}

impl TlsTransport {
    /// Creates a transport trusting the root set bundled with
    /// `webpki-roots`.
    #[must_use]
    pub fn new() -> Self {
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        Self::with_root_store(roots)
    }

    /// Creates a transport trusting exactly the given roots.
    #[must_use]
    pub fn with_root_store(roots: RootCertStore) -> Self {
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Self {
            connector: TlsConnector::from(Arc::new(config)),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Creates a transport trusting the CA certificates in the given PEM
    /// bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundle cannot be read or contains no
    /// usable certificate.
    pub fn with_ca_pem(pem: &[u8]) -> Result<Self> {
        let mut roots = RootCertStore::empty();
        let mut reader = std::io::BufReader::new(pem);
        for certificate in rustls_pemfile::certs(&mut reader) {
            roots.add(certificate?)?;
        }
        if roots.is_empty() {
            return Err(Error::EmptyCaBundle);
        }
        Ok(Self::with_root_store(roots))
    }

    /// Sets the time allowed for connection establishment, TLS handshake
    /// included.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for TlsTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for TlsTransport {
    async fn connect(&self, host: &str, port: u16) -> Result<Arc<dyn Connection>> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| Error::InvalidHostname(host.to_string()))?;
        let stream = timeout(self.connect_timeout, async {
            let tcp = TcpStream::connect((host, port)).await?;
            let local_addr = tcp.local_addr()?;
            let tls = self.connector.connect(server_name, tcp).await?;
            Ok::<_, Error>((tls, local_addr))
        })
        .await
        .map_err(|_| Error::Timeout)?;
        let (tls, local_addr) = stream?;
        Ok(Arc::new(StreamConnection::new(tls, local_addr)))
    }
}

impl std::fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsTransport")
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}
