//! SMTP submission state machine.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use super::{CommandChannel, Connector, ServerInfo, SessionState, Timeouts, Transport};
use crate::command::{Command, encode_data};
use crate::error::{Error, Result, Stage};
use crate::types::{Address, Extension, Reply, ReplyCode};

/// How long `close` waits for the relay to acknowledge `QUIT`.
const QUIT_REPLY_GRACE: Duration = Duration::from_secs(1);

/// Username and password for `AUTH PLAIN`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Secret.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// Where and how to reach the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Relay hostname (also the TLS server name).
    pub host: String,
    /// Relay port.
    pub port: u16,
    /// Identity announced in EHLO.
    pub ehlo_name: String,
    /// Connect, I/O and overall time limits.
    pub timeouts: Timeouts,
}

impl ClientSettings {
    /// Creates settings announcing the relay host as EHLO identity.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            ehlo_name: host.clone(),
            host,
            port,
            timeouts: Timeouts::default(),
        }
    }

    /// Overrides the EHLO identity.
    #[must_use]
    pub fn ehlo_name(mut self, name: impl Into<String>) -> Self {
        self.ehlo_name = name.into();
        self
    }

    /// Sets the timeouts.
    #[must_use]
    pub const fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// SMTP client for exactly one message.
///
/// Every operation checks the current [`SessionState`] before anything is
/// written, so commands can only go out in protocol order. A refused reply
/// or a transport error closes the session before the error is returned;
/// [`stage`](Self::stage) then names the step that failed.
pub struct SmtpClient<S> {
    settings: ClientSettings,
    channel: Option<CommandChannel<S>>,
    state: SessionState,
    stage: Stage,
    server_info: ServerInfo,
}

impl<S> SmtpClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Creates a disconnected client.
    #[must_use]
    pub fn new(settings: ClientSettings) -> Self {
        Self {
            settings,
            channel: None,
            state: SessionState::Disconnected,
            stage: Stage::Connect,
            server_info: ServerInfo::default(),
        }
    }

    /// Current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// The step most recently attempted.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Capabilities learned from the greeting and EHLO.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Opens the encrypted transport and waits for the 220 greeting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the transport cannot be opened and
    /// [`Error::Greeting`] for any greeting other than 220.
    pub async fn connect<C>(&mut self, connector: &C) -> Result<Reply>
    where
        C: Connector<Stream = S>,
    {
        self.enter("connect", SessionState::Disconnected, Stage::Connect)?;

        let opened = Transport::open(
            connector,
            &self.settings.host,
            self.settings.port,
            self.settings.timeouts,
        )
        .await;
        let transport = match opened {
            Ok(transport) => transport,
            Err(e) => {
                self.state = SessionState::Closed;
                tracing::warn!(host = %self.settings.host, error = %e, "connect failed");
                return Err(e);
            }
        };
        self.channel = Some(CommandChannel::new(transport));

        self.stage = Stage::Greeting;
        let result = match self.channel.as_mut() {
            Some(channel) => channel.read_reply().await,
            None => Err(Error::ConnectionClosed),
        };
        let greeting = self.settle(result, &[ReplyCode::SERVICE_READY]).await?;

        self.server_info.hostname = greeting
            .lines
            .first()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        self.state = SessionState::Connected;
        Ok(greeting)
    }

    /// Sends `EHLO` and records advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the relay does not answer 250.
    pub async fn greet(&mut self) -> Result<&ServerInfo> {
        self.enter("greet", SessionState::Connected, Stage::Ehlo)?;

        let command = Command::Ehlo {
            hostname: self.settings.ehlo_name.clone(),
        };
        let reply = self.command(&command, &[ReplyCode::OK]).await?;

        // First line is the server's identity, the rest are extensions.
        self.server_info.extensions = reply
            .lines
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();
        self.state = SessionState::Greeted;
        Ok(&self.server_info)
    }

    /// Authenticates with `AUTH PLAIN`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] for any reply other than 235.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        self.enter("authenticate", SessionState::Greeted, Stage::Auth)?;

        if let Some(mechanisms) = self.server_info.auth_mechanisms()
            && !mechanisms.iter().any(|m| m == "PLAIN")
        {
            tracing::warn!(?mechanisms, "relay does not advertise AUTH PLAIN");
        }

        let command = Command::auth_plain(&credentials.username, &credentials.password);
        self.command(&command, &[ReplyCode::AUTH_SUCCESS]).await?;
        self.state = SessionState::Authenticated;
        Ok(())
    }

    /// Opens the mail transaction with `MAIL FROM`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the sender is refused.
    pub async fn begin_transaction(&mut self, from: &Address) -> Result<()> {
        self.enter(
            "begin_transaction",
            SessionState::Authenticated,
            Stage::MailFrom,
        )?;

        let command = Command::MailFrom { from: from.clone() };
        self.command(&command, &[ReplyCode::OK]).await?;
        self.state = SessionState::InTransaction;
        Ok(())
    }

    /// Adds a recipient with `RCPT TO`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecipientRejected`] for any reply other than 250/251.
    pub async fn add_recipient(&mut self, to: &Address) -> Result<()> {
        self.enter("add_recipient", SessionState::InTransaction, Stage::Recipient)?;

        let command = Command::RcptTo { to: to.clone() };
        self.command(&command, &[ReplyCode::OK, ReplyCode::FORWARD])
            .await?;
        Ok(())
    }

    /// Refuses a payload the relay already said it would not accept.
    ///
    /// `payload_len` is the length on the wire, as framed by
    /// [`encode_data`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`] if the relay advertised a smaller
    /// `SIZE`; the session is closed in that case.
    pub async fn check_size(&mut self, payload_len: usize) -> Result<()> {
        self.enter("check_size", SessionState::InTransaction, Stage::Data)?;

        match self.server_info.max_message_size() {
            Some(limit) if payload_len > limit => {
                let error = Error::MessageTooLarge {
                    size: payload_len,
                    limit,
                };
                self.abort(&error).await;
                Err(error)
            }
            _ => Ok(()),
        }
    }

    /// Sends `DATA` and waits for the 354 go-ahead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for any reply other than 354.
    pub async fn begin_data(&mut self) -> Result<()> {
        self.enter("begin_data", SessionState::InTransaction, Stage::Data)?;

        self.command(&Command::Data, &[ReplyCode::START_DATA])
            .await?;
        self.state = SessionState::DataMode;
        Ok(())
    }

    /// Transmits the message, terminated by `CRLF . CRLF`, and checks the
    /// relay's final verdict.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the relay does not accept the message
    /// with 250.
    pub async fn send_message(&mut self, message: &[u8]) -> Result<Reply> {
        self.send_payload(&encode_data(message)).await
    }

    /// Like [`send_message`](Self::send_message) for a payload already
    /// framed by [`encode_data`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the relay does not accept the message
    /// with 250.
    pub async fn send_payload(&mut self, payload: &[u8]) -> Result<Reply> {
        self.enter("send_message", SessionState::DataMode, Stage::Message)?;

        let result = match self.channel.as_mut() {
            Some(channel) => match channel.send_raw(payload).await {
                Ok(()) => channel.read_reply().await,
                Err(e) => Err(e),
            },
            None => Err(Error::ConnectionClosed),
        };
        let reply = self.settle(result, &[ReplyCode::OK]).await?;
        self.state = SessionState::InTransaction;
        Ok(reply)
    }

    /// Ends the session: best-effort `QUIT`, then releases the transport.
    /// Safe to call from any state, any number of times.
    ///
    /// The reply to `QUIT` is ignored and waited for at most one second.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;

        let Some(mut channel) = self.channel.take() else {
            return;
        };
        if !channel.is_broken() && channel.send_command(&Command::Quit).await.is_ok() {
            match tokio::time::timeout(QUIT_REPLY_GRACE, channel.read_reply()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "QUIT not acknowledged"),
                Err(_) => tracing::debug!("no reply to QUIT within {QUIT_REPLY_GRACE:?}"),
            }
        }
        channel.close().await;
    }

    fn enter(&mut self, operation: &'static str, required: SessionState, stage: Stage) -> Result<()> {
        if self.state != required {
            return Err(Error::InvalidState {
                operation,
                state: self.state,
            });
        }
        self.stage = stage;
        Ok(())
    }

    async fn command(&mut self, command: &Command, accept: &[ReplyCode]) -> Result<Reply> {
        let result = match self.channel.as_mut() {
            Some(channel) => channel.round_trip(command).await,
            None => Err(Error::ConnectionClosed),
        };
        self.settle(result, accept).await
    }

    /// Turns a reply outside `accept` into the stage's error; closes the
    /// session on any failure.
    async fn settle(&mut self, result: Result<Reply>, accept: &[ReplyCode]) -> Result<Reply> {
        let outcome = match result {
            Ok(reply) if reply.is_any_of(accept) => Ok(reply),
            Ok(reply) => Err(Error::rejected(
                self.stage,
                reply.code.as_u16(),
                reply.message_text(),
            )),
            Err(e) => Err(e),
        };

        if let Err(e) = &outcome {
            self.abort(e).await;
        }
        outcome
    }

    async fn abort(&mut self, error: &Error) {
        tracing::warn!(stage = %self.stage, error = %error, "SMTP session aborted");
        self.close().await;
    }
}

impl<S> fmt::Debug for SmtpClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpClient")
            .field("host", &self.settings.host)
            .field("port", &self.settings.port)
            .field("state", &self.state)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}
