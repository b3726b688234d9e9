//! One-shot submission: connect, authenticate, transmit, quit.

use super::{ClientSettings, Connector, Credentials, SmtpClient};
use crate::command::encode_data;
use crate::error::{Error, Result, SendFailure};
use crate::types::{Address, Reply};

/// Envelope sender and recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// `MAIL FROM` address.
    pub from: Address,
    /// `RCPT TO` addresses, in order.
    pub recipients: Vec<Address>,
}

impl Envelope {
    /// Creates an envelope with a single recipient.
    #[must_use]
    pub fn new(from: Address, to: Address) -> Self {
        Self {
            from,
            recipients: vec![to],
        }
    }

    /// Adds another recipient.
    #[must_use]
    pub fn with_recipient(mut self, to: Address) -> Self {
        self.recipients.push(to);
        self
    }
}

/// Proof of acceptance: the relay's reply to the terminating dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Final 250 reply, usually carrying the relay's queue id.
    pub reply: Reply,
}

/// Delivers `message` to the relay in one session.
///
/// Runs connect, greeting, EHLO, AUTH PLAIN, MAIL FROM, RCPT TO, DATA, the
/// payload and QUIT strictly in order, each step waiting for its reply.
/// Nothing is retried. Whatever happens, the session is closed before this
/// returns.
///
/// # Errors
///
/// Returns a [`SendFailure`] naming the stage that failed and the
/// underlying error (reply code and server text included when the relay
/// refused a command).
pub async fn send<C: Connector>(
    connector: &C,
    settings: ClientSettings,
    credentials: &Credentials,
    envelope: &Envelope,
    message: &[u8],
) -> std::result::Result<Receipt, SendFailure> {
    let mut client = SmtpClient::new(settings);
    let outcome = drive(&mut client, connector, credentials, envelope, message).await;
    client.close().await;

    outcome.map_err(|error| SendFailure::new(client.stage(), error))
}

async fn drive<C: Connector>(
    client: &mut SmtpClient<C::Stream>,
    connector: &C,
    credentials: &Credentials,
    envelope: &Envelope,
    message: &[u8],
) -> Result<Receipt> {
    if envelope.recipients.is_empty() {
        return Err(Error::InvalidAddress("No recipients specified".into()));
    }

    client.connect(connector).await?;
    client.greet().await?;
    client.authenticate(credentials).await?;
    client.begin_transaction(&envelope.from).await?;
    for recipient in &envelope.recipients {
        client.add_recipient(recipient).await?;
    }
    let payload = encode_data(message);
    client.check_size(payload.len()).await?;
    client.begin_data().await?;
    let reply = client.send_payload(&payload).await?;

    Ok(Receipt { reply })
}
