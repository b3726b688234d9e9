//! Relay configuration.
//!
//! Settings are read from a [`ConfigSource`] on every send, so a changed
//! environment takes effect without a restart.
//!
//! | Key | Default |
//! |---|---|
//! | `SMTP_HOST` | `smtp.gmail.com` |
//! | `SMTP_PORT` | `465` |
//! | `SMTP_USERNAME` | required |
//! | `SMTP_PASSWORD` | required |
//! | `FROM_EMAIL` | required |
//! | `FROM_NAME` | `TeamFlow` |
//! | `SMTP_EHLO_NAME` | value of `SMTP_HOST` |
//! | `SMTP_CONNECT_TIMEOUT_SECS` | `30` |
//! | `SMTP_IO_TIMEOUT_SECS` | `30` |
//! | `SMTP_SEND_TIMEOUT_SECS` | no overall deadline |
//! | `MAILER_BIND_ADDR` | `127.0.0.1:8080` |

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use teamflow_mime::Mailbox;
use teamflow_smtp::{Address, ClientSettings, Credentials, Timeouts};
use tokio::time::Instant;

use crate::error::{Error, Result};

/// Relay hostname.
pub const SMTP_HOST: &str = "SMTP_HOST";
/// Relay port (implicit TLS).
pub const SMTP_PORT: &str = "SMTP_PORT";
/// AUTH PLAIN username.
pub const SMTP_USERNAME: &str = "SMTP_USERNAME";
/// AUTH PLAIN password.
pub const SMTP_PASSWORD: &str = "SMTP_PASSWORD";
/// Envelope sender and `From` address.
pub const FROM_EMAIL: &str = "FROM_EMAIL";
/// `From` display name.
pub const FROM_NAME: &str = "FROM_NAME";
/// EHLO identity.
pub const SMTP_EHLO_NAME: &str = "SMTP_EHLO_NAME";
/// Connect plus handshake bound, in seconds.
pub const SMTP_CONNECT_TIMEOUT_SECS: &str = "SMTP_CONNECT_TIMEOUT_SECS";
/// Per read/write bound, in seconds.
pub const SMTP_IO_TIMEOUT_SECS: &str = "SMTP_IO_TIMEOUT_SECS";
/// Whole-send deadline, in seconds.
pub const SMTP_SEND_TIMEOUT_SECS: &str = "SMTP_SEND_TIMEOUT_SECS";
/// Listen address of the HTTP boundary.
pub const MAILER_BIND_ADDR: &str = "MAILER_BIND_ADDR";

const DEFAULT_HOST: &str = "smtp.gmail.com";
const DEFAULT_PORT: u16 = 465;
const DEFAULT_FROM_NAME: &str = "TeamFlow";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Where configuration values come from.
pub trait ConfigSource: Send + Sync {
    /// Raw value for `key`, if set.
    fn get(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl ConfigSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Everything needed to reach and authenticate with the relay.
#[derive(Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Relay hostname.
    pub host: String,
    /// Relay port.
    pub port: u16,
    /// AUTH username.
    pub username: String,
    /// AUTH password.
    pub password: String,
    /// Sender address.
    pub from_email: Address,
    /// Sender display name.
    pub from_name: String,
    /// EHLO identity.
    pub ehlo_name: String,
    /// Connect plus handshake bound.
    pub connect_timeout: Duration,
    /// Per read/write bound.
    pub io_timeout: Duration,
    /// Whole-send bound, if any.
    pub send_timeout: Option<Duration>,
}

impl RelayConfig {
    /// Reads and validates the relay settings.
    ///
    /// Blank values count as unset. All missing required keys are reported
    /// together.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a required key is missing or a
    /// value cannot be parsed.
    pub fn load(source: &impl ConfigSource) -> Result<Self> {
        let username = value(source, SMTP_USERNAME);
        let password = value(source, SMTP_PASSWORD);
        let from_email = value(source, FROM_EMAIL);

        let missing: Vec<&str> = [
            (SMTP_USERNAME, username.is_none()),
            (SMTP_PASSWORD, password.is_none()),
            (FROM_EMAIL, from_email.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, absent)| absent.then_some(key))
        .collect();

        let (Some(username), Some(password), Some(from_email)) = (username, password, from_email)
        else {
            return Err(Error::Configuration(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        };

        let from_email = Address::new(from_email)
            .map_err(|e| Error::Configuration(format!("{FROM_EMAIL}: {e}")))?;
        let host = value(source, SMTP_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let ehlo_name = value(source, SMTP_EHLO_NAME).unwrap_or_else(|| host.clone());

        Ok(Self {
            port: parsed(source, SMTP_PORT)?.unwrap_or(DEFAULT_PORT),
            username,
            password,
            from_email,
            from_name: value(source, FROM_NAME).unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
            ehlo_name,
            connect_timeout: seconds(source, SMTP_CONNECT_TIMEOUT_SECS)?
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            io_timeout: seconds(source, SMTP_IO_TIMEOUT_SECS)?
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            send_timeout: seconds(source, SMTP_SEND_TIMEOUT_SECS)?,
            host,
        })
    }

    /// Client settings for one send; the overall deadline starts now.
    #[must_use]
    pub fn client_settings(&self) -> ClientSettings {
        let timeouts = Timeouts {
            connect: self.connect_timeout,
            io: self.io_timeout,
            deadline: self
                .send_timeout
                .and_then(|limit| Instant::now().checked_add(limit)),
        };
        ClientSettings::new(self.host.as_str(), self.port)
            .ehlo_name(self.ehlo_name.as_str())
            .timeouts(timeouts)
    }

    /// AUTH PLAIN credentials.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.as_str(), self.password.as_str())
    }

    /// The `From` mailbox.
    #[must_use]
    pub fn sender(&self) -> Mailbox {
        Mailbox::with_name(self.from_name.as_str(), self.from_email.as_str())
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"****")
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .field("ehlo_name", &self.ehlo_name)
            .finish_non_exhaustive()
    }
}

/// Address the HTTP boundary listens on.
#[must_use]
pub fn bind_addr(source: &impl ConfigSource) -> String {
    value(source, MAILER_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
}

fn value(source: &impl ConfigSource, key: &str) -> Option<String> {
    source
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(source: &impl ConfigSource, key: &str) -> Result<Option<T>> {
    value(source, key)
        .map(|raw| {
            raw.parse()
                .map_err(|_| Error::Configuration(format!("{key}: cannot parse '{raw}'")))
        })
        .transpose()
}

fn seconds(source: &impl ConfigSource, key: &str) -> Result<Option<Duration>> {
    Ok(parsed::<u64>(source, key)?.map(Duration::from_secs))
}
