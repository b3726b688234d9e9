//! Command/reply framing on top of a [`Transport`].

use tokio::io::{AsyncRead, AsyncWrite};

use super::Transport;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::ReplyDecoder;
use crate::types::Reply;

/// One request/response unit at a time over a transport.
///
/// There is no pipelining: callers write a command and then wait for its
/// reply before writing anything else. After any transport or framing
/// error the channel is marked broken and refuses further traffic.
pub struct CommandChannel<S> {
    transport: Transport<S>,
    decoder: ReplyDecoder,
    broken: bool,
}

impl<S> CommandChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Creates a channel over an open transport.
    pub fn new(transport: Transport<S>) -> Self {
        Self {
            transport,
            decoder: ReplyDecoder::new(),
            broken: false,
        }
    }

    /// Returns true once a transport or framing error has occurred.
    #[must_use]
    pub const fn is_broken(&self) -> bool {
        self.broken
    }

    /// Writes one command line (CRLF appended by serialization).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or times out.
    pub async fn send_command(&mut self, command: &Command) -> Result<()> {
        self.ensure_usable()?;
        tracing::debug!("C: {}", command.redacted());
        let result = self.transport.write(&command.serialize()).await;
        self.track(result)
    }

    /// Writes raw payload bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or times out.
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_usable()?;
        tracing::debug!("C: <{} bytes of message data>", data.len());
        let result = self.transport.write(data).await;
        self.track(result)
    }

    /// Reads until a complete (possibly multi-line) reply is available.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if a partial reply is not completed within
    /// the I/O budget, [`Error::ConnectionClosed`] if the relay hangs up
    /// mid-reply, or [`Error::MalformedReply`] for unparsable output.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        self.ensure_usable()?;
        let result = self.next_reply().await;
        let reply = self.track(result)?;
        for line in &reply.lines {
            tracing::debug!("S: {} {line}", reply.code);
        }
        Ok(reply)
    }

    /// Writes a command and waits for its reply.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command) and
    /// [`read_reply`](Self::read_reply).
    pub async fn round_trip(&mut self, command: &Command) -> Result<Reply> {
        self.send_command(command).await?;
        self.read_reply().await
    }

    /// Releases the transport. Safe to call repeatedly.
    pub async fn close(&mut self) {
        self.transport.close().await;
    }

    async fn next_reply(&mut self) -> Result<Reply> {
        loop {
            if let Some(reply) = self.decoder.decode()? {
                return Ok(reply);
            }
            self.transport.read(self.decoder.buffer_mut()).await?;
        }
    }

    const fn ensure_usable(&self) -> Result<()> {
        if self.broken || !self.transport.is_open() {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if matches!(&result, Err(e) if e.is_fatal_io()) {
            self.broken = true;
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tokio_test::io::Builder;

    use super::*;
    use crate::connection::Timeouts;
    use crate::types::{Address, ReplyCode};

    fn channel(stream: tokio_test::io::Mock) -> CommandChannel<tokio_test::io::Mock> {
        CommandChannel::new(Transport::from_stream(stream, Timeouts::default()))
    }

    #[tokio::test]
    async fn round_trip_single_line() {
        let mock = Builder::new()
            .write(b"MAIL FROM:<sender@x.com>\r\n")
            .read(b"250 OK\r\n")
            .build();
        let mut channel = channel(mock);

        let command = Command::MailFrom {
            from: Address::new("sender@x.com").unwrap(),
        };
        let reply = channel.round_trip(&command).await.unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert!(!reply.is_multiline());
    }

    #[tokio::test]
    async fn reply_split_across_reads() {
        let mock = Builder::new()
            .write(b"EHLO localhost\r\n")
            .read(b"250-relay.exa")
            .read(b"mple.com\r")
            .read(b"\n250-SIZE 1000\r\n250 AUTH PLAIN")
            .read(b"\r\n")
            .build();
        let mut channel = channel(mock);

        let reply = channel
            .round_trip(&Command::Ehlo {
                hostname: "localhost".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.lines, vec!["relay.example.com", "SIZE 1000", "AUTH PLAIN"]);
    }

    #[tokio::test]
    async fn eof_mid_reply_is_connection_closed() {
        let mock = Builder::new().read(b"250-partial\r\n").build();
        let mut channel = channel(mock);

        let err = channel.read_reply().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        assert!(channel.is_broken());
        assert!(matches!(
            channel.send_command(&Command::Quit).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn malformed_reply_breaks_channel() {
        let mock = Builder::new().read(b"ABC OK\r\n").build();
        let mut channel = channel(mock);

        assert!(matches!(
            channel.read_reply().await,
            Err(Error::MalformedReply(_))
        ));
        assert!(channel.is_broken());
    }

    #[tokio::test]
    async fn partial_line_times_out() {
        let (client, mut server) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_all(&mut server, b"250 never fin")
            .await
            .unwrap();

        let timeouts = Timeouts {
            io: Duration::from_millis(50),
            ..Timeouts::default()
        };
        let mut channel = CommandChannel::new(Transport::from_stream(client, timeouts));
        assert!(matches!(channel.read_reply().await, Err(Error::Timeout(_))));
    }
}
