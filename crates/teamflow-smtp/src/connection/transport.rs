//! Encrypted byte stream to the relay.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout};
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::error::{Error, Result};

/// Opens the byte stream a session runs over.
///
/// Production code uses [`ImplicitTls`]; tests substitute an in-memory
/// relay. Whatever the implementation, the stream it returns must already
/// be encrypted: no protocol byte is written before `connect` resolves.
pub trait Connector: Send + Sync {
    /// Stream type produced by this connector.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Connects to `host:port` and completes any handshake.
    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// Implicit TLS (port 465 style): TCP connect, then TLS handshake.
#[derive(Clone)]
pub struct ImplicitTls {
    config: Arc<ClientConfig>,
}

impl ImplicitTls {
    /// Creates a connector trusting the webpki root certificates.
    #[must_use]
    pub fn new() -> Self {
        let root_store = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };

        let config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Self::with_config(Arc::new(config))
    }

    /// Creates a connector from a prepared rustls configuration.
    #[must_use]
    pub const fn with_config(config: Arc<ClientConfig>) -> Self {
        Self { config }
    }
}

impl Default for ImplicitTls {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ImplicitTls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImplicitTls").finish_non_exhaustive()
    }
}

impl Connector for ImplicitTls {
    type Stream = TlsStream<TcpStream>;

    async fn connect(&self, host: &str, port: u16) -> Result<Self::Stream> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| Error::Connection(format!("Invalid hostname: {host}")))?;

        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(|e| Error::Connection(format!("{host}:{port}: {e}")))?;

        let connector = tokio_rustls::TlsConnector::from(Arc::clone(&self.config));
        connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| Error::Connection(format!("TLS handshake with {host}: {e}")))
    }
}

/// Timeouts governing one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Bound on TCP connect plus TLS handshake.
    pub connect: Duration,
    /// Bound on each individual read or write.
    pub io: Duration,
    /// Absolute deadline for the whole session, if the caller imposed one.
    pub deadline: Option<Instant>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            io: Duration::from_secs(30),
            deadline: None,
        }
    }
}

impl Timeouts {
    /// Time allowed for the next wait: the per-operation bound, clipped to
    /// whatever is left before the deadline.
    #[must_use]
    pub fn budget(&self, per_operation: Duration) -> Duration {
        self.deadline.map_or(per_operation, |deadline| {
            per_operation.min(deadline.saturating_duration_since(Instant::now()))
        })
    }
}

/// A connected, encrypted, ordered byte stream.
///
/// The stream is released when the transport is closed or dropped,
/// whichever comes first.
pub struct Transport<S> {
    stream: Option<S>,
    timeouts: Timeouts,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Opens a transport through `connector`, bounded by the connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the handshake fails or does not
    /// complete in time.
    pub async fn open<C>(
        connector: &C,
        host: &str,
        port: u16,
        timeouts: Timeouts,
    ) -> Result<Self>
    where
        C: Connector<Stream = S>,
    {
        let budget = timeouts.budget(timeouts.connect);
        let stream = timeout(budget, connector.connect(host, port))
            .await
            .map_err(|_| {
                Error::Connection(format!(
                    "{host}:{port}: handshake not complete after {budget:?}"
                ))
            })??;

        tracing::debug!(host, port, "transport established");
        Ok(Self::from_stream(stream, timeouts))
    }

    /// Wraps an already-established stream.
    pub const fn from_stream(stream: S, timeouts: Timeouts) -> Self {
        Self {
            stream: Some(stream),
            timeouts,
        }
    }

    /// Returns true until [`close`](Self::close) has run.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Returns the session timeouts.
    #[must_use]
    pub const fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Reads whatever is available into `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] on end of stream and
    /// [`Error::Timeout`] if nothing arrives within the I/O budget.
    pub async fn read(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let budget = self.timeouts.budget(self.timeouts.io);
        let stream = self.stream.as_mut().ok_or(Error::ConnectionClosed)?;

        match timeout(budget, stream.read_buf(buf)).await {
            Err(_) => Err(Error::Timeout(budget)),
            Ok(Ok(0)) => Err(Error::ConnectionClosed),
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => Err(e.into()),
        }
    }

    /// Writes and flushes `data`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the write does not complete within the
    /// I/O budget, or the underlying I/O error.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        let budget = self.timeouts.budget(self.timeouts.io);
        let stream = self.stream.as_mut().ok_or(Error::ConnectionClosed)?;

        timeout(budget, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| Error::Timeout(budget))?
        .map_err(Error::from)
    }

    /// Shuts the stream down and releases it. Safe to call repeatedly.
    pub async fn close(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };

        let budget = self.timeouts.budget(self.timeouts.io);
        if let Ok(Err(e)) = timeout(budget, stream.shutdown()).await {
            tracing::trace!(error = %e, "shutdown after close");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn quick() -> Timeouts {
        Timeouts {
            connect: Duration::from_millis(50),
            io: Duration::from_millis(50),
            deadline: None,
        }
    }

    #[test]
    fn test_create_tls_connector() {
        let connector = ImplicitTls::new();
        assert!(format!("{connector:?}").starts_with("ImplicitTls"));
    }

    #[tokio::test]
    async fn test_invalid_hostname_is_connection_error() {
        let err = ImplicitTls::new().connect("not a host", 465).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[test]
    fn test_budget_without_deadline() {
        assert_eq!(quick().budget(Duration::from_secs(5)), Duration::from_secs(5));
    }

    #[test]
    fn test_budget_clipped_by_deadline() {
        let timeouts = Timeouts {
            deadline: Some(Instant::now()),
            ..quick()
        };
        assert_eq!(timeouts.budget(Duration::from_secs(5)), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_read_eof_is_connection_closed() {
        let (client, server) = tokio::io::duplex(64);
        drop(server);
        let mut transport = Transport::from_stream(client, quick());
        let mut buf = BytesMut::new();
        assert!(matches!(
            transport.read(&mut buf).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_read_times_out() {
        let (client, _server) = tokio::io::duplex(64);
        let mut transport = Transport::from_stream(client, quick());
        let mut buf = BytesMut::new();
        assert!(matches!(
            transport.read(&mut buf).await,
            Err(Error::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (client, _server) = tokio::io::duplex(64);
        let mut transport = Transport::from_stream(client, quick());
        transport.close().await;
        transport.close().await;
        assert!(!transport.is_open());
        assert!(matches!(
            transport.write(b"QUIT\r\n").await,
            Err(Error::ConnectionClosed)
        ));
    }
}
