//! Scripted in-memory relay for exercising the client without a network.
//!
//! [`MockConnector`] hands the client one end of a [`tokio::io::duplex`]
//! pipe and runs a [`MockRelay`] on the other. The relay answers each
//! command by verb from a reply table and records everything it sees in a
//! [`Transcript`].

use std::collections::HashMap;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::Mutex;

use crate::connection::Connector;
use crate::error::{Error, Result};

/// Reply-table key for the verdict after the terminating dot.
pub const END_OF_DATA: &str = ".";

const PIPE_CAPACITY: usize = 64 * 1024;

/// What the relay saw during its sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// `host:port` of each connection attempt.
    pub connects: Vec<String>,
    /// Command lines received, CRLF stripped, in order.
    pub commands: Vec<String>,
    /// Raw bytes received after 354, terminating dot line included.
    pub message: Option<Vec<u8>>,
}

impl Transcript {
    /// Command verbs received, in order.
    #[must_use]
    pub fn verbs(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|line| line.split_whitespace().next().unwrap_or_default().to_uppercase())
            .collect()
    }
}

/// Reply script for one relay.
#[derive(Debug, Clone)]
pub struct MockRelay {
    greeting: Option<String>,
    replies: HashMap<String, String>,
    hang_on: Option<String>,
    refuse: bool,
}

impl Default for MockRelay {
    fn default() -> Self {
        let replies = [
            (
                "EHLO",
                "250-mock.relay greets you\r\n250-AUTH PLAIN LOGIN\r\n250-SIZE 10485760\r\n250 8BITMIME",
            ),
            ("AUTH", "235 2.7.0 Authentication successful"),
            ("MAIL", "250 2.1.0 Sender OK"),
            ("RCPT", "250 2.1.5 Recipient OK"),
            ("DATA", "354 End data with <CR><LF>.<CR><LF>"),
            (END_OF_DATA, "250 2.0.0 Ok: queued as MOCK123"),
            ("QUIT", "221 2.0.0 Bye"),
        ]
        .into_iter()
        .map(|(verb, reply)| (verb.to_string(), reply.to_string()))
        .collect();

        Self {
            greeting: Some("220 mock.relay ESMTP ready".to_string()),
            replies,
            hang_on: None,
            refuse: false,
        }
    }
}

impl MockRelay {
    /// A relay that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the greeting.
    #[must_use]
    pub fn greeting(mut self, reply: impl Into<String>) -> Self {
        self.greeting = Some(reply.into());
        self
    }

    /// Never sends a greeting.
    #[must_use]
    pub fn silent(mut self) -> Self {
        self.greeting = None;
        self
    }

    /// Replaces the reply to `verb` (or [`END_OF_DATA`]).
    #[must_use]
    pub fn reply(mut self, verb: &str, reply: impl Into<String>) -> Self {
        self.replies.insert(verb.to_uppercase(), reply.into());
        self
    }

    /// Stops answering once `verb` arrives, keeping the stream open.
    #[must_use]
    pub fn hang_on(mut self, verb: &str) -> Self {
        self.hang_on = Some(verb.to_uppercase());
        self
    }

    /// Fails the connection attempt itself.
    #[must_use]
    pub const fn refuse_connections(mut self) -> Self {
        self.refuse = true;
        self
    }

    fn reply_for(&self, verb: &str) -> &str {
        self.replies
            .get(verb)
            .map_or("500 5.5.2 Command not recognized", String::as_str)
    }

    async fn serve(self, mut stream: DuplexStream, transcript: Arc<Mutex<Transcript>>) {
        let Some(greeting) = self.greeting.clone() else {
            drain(&mut stream).await;
            return;
        };
        if write_reply(&mut stream, &greeting).await.is_err() {
            return;
        }

        let mut buf = BytesMut::new();
        let mut in_data = false;

        loop {
            if in_data {
                if let Some(pos) = find(&buf, b"\r\n.\r\n") {
                    let data = buf.split_to(pos + 5);
                    transcript.lock().await.message = Some(data.to_vec());
                    in_data = false;
                    if write_reply(&mut stream, self.reply_for(END_OF_DATA)).await.is_err() {
                        return;
                    }
                    continue;
                }
            } else if let Some(pos) = find(&buf, b"\r\n") {
                let raw = buf.split_to(pos + 2);
                let line = String::from_utf8_lossy(&raw[..pos]).into_owned();
                let verb = line
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_uppercase();
                transcript.lock().await.commands.push(line);

                if self.hang_on.as_deref() == Some(verb.as_str()) {
                    drain(&mut stream).await;
                    return;
                }

                let reply = self.reply_for(&verb);
                if write_reply(&mut stream, reply).await.is_err() {
                    return;
                }
                if verb == "QUIT" {
                    return;
                }
                in_data = verb == "DATA" && reply.starts_with("354");
                continue;
            }

            match stream.read_buf(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
        }
    }
}

/// Connector that runs a [`MockRelay`] per connection.
#[derive(Debug, Clone)]
pub struct MockConnector {
    relay: MockRelay,
    transcript: Arc<Mutex<Transcript>>,
}

impl MockConnector {
    /// Creates a connector serving `relay`.
    #[must_use]
    pub fn new(relay: MockRelay) -> Self {
        Self {
            relay,
            transcript: Arc::default(),
        }
    }

    /// Snapshot of everything the relay has seen so far.
    pub async fn transcript(&self) -> Transcript {
        self.transcript.lock().await.clone()
    }
}

impl Connector for MockConnector {
    type Stream = DuplexStream;

    async fn connect(&self, host: &str, port: u16) -> Result<Self::Stream> {
        self.transcript
            .lock()
            .await
            .connects
            .push(format!("{host}:{port}"));

        if self.relay.refuse {
            return Err(Error::Connection(format!("{host}:{port}: connection refused")));
        }

        let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
        tokio::spawn(
            self.relay
                .clone()
                .serve(server, Arc::clone(&self.transcript)),
        );
        Ok(client)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

async fn write_reply(stream: &mut DuplexStream, reply: &str) -> std::io::Result<()> {
    stream.write_all(reply.as_bytes()).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await
}

async fn drain(stream: &mut DuplexStream) {
    let mut sink = Vec::new();
    let _ = stream.read_to_end(&mut sink).await;
}
