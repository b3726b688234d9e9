//! SMTP reply parser.
//!
//! Parsing is kept free of any socket so it can be driven by replaying
//! captured byte sequences. [`ReplyDecoder`] is the incremental form used by
//! the command channel; [`parse_reply`] parses a complete reply in one go.

use bytes::{Buf, BytesMut};

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Longest reply line accepted before the relay is considered broken.
pub const MAX_LINE_LENGTH: usize = 8192;

/// Most lines a single reply may span.
pub const MAX_REPLY_LINES: usize = 512;

/// Parses a complete SMTP reply from raw text.
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK\r\n`
/// - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
///
/// The trailing CRLF of the final line is optional here.
///
/// # Errors
///
/// Returns an error if the reply is malformed.
pub fn parse_reply(raw: &str) -> Result<Reply> {
    let lines: Vec<&str> = raw
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
        .collect();
    parse_lines(&lines)
}

/// Parses an SMTP reply from its individual lines (CRLF already removed).
///
/// Every line must carry the same code; all but the last must use the `-`
/// continuation separator.
///
/// # Errors
///
/// Returns an error if the reply is malformed.
pub fn parse_lines<S: AsRef<str>>(lines: &[S]) -> Result<Reply> {
    let Some((last, _)) = lines.split_last() else {
        return Err(Error::MalformedReply("Empty reply".into()));
    };

    let code = parse_code(last.as_ref())?;
    let mut text = Vec::with_capacity(lines.len());

    for (index, line) in lines.iter().enumerate() {
        let line = line.as_ref();
        if parse_code(line)? != code {
            return Err(Error::MalformedReply(format!(
                "Reply code changed mid-reply: {line}"
            )));
        }

        let is_final = index + 1 == lines.len();
        if is_final != is_last_reply_line(line) {
            return Err(Error::MalformedReply(format!(
                "Unexpected continuation marker: {line}"
            )));
        }

        text.push(line.get(4..).unwrap_or_default().to_string());
    }

    Ok(Reply::new(code, text))
}

/// Checks if a line is the last line of a multi-line reply.
///
/// Multi-line replies use `-` separator for continuation and ` ` for the
/// last line. A bare three-digit code is also terminal.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    match line.as_bytes().get(3) {
        None => line.len() == 3,
        Some(b) => *b == b' ',
    }
}

fn parse_code(line: &str) -> Result<ReplyCode> {
    let digits = line
        .get(0..3)
        .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| Error::MalformedReply(format!("Invalid reply code: {line}")))?;

    match line.as_bytes().get(3) {
        None | Some(b' ' | b'-') => {}
        Some(_) => {
            return Err(Error::MalformedReply(format!(
                "Invalid reply separator: {line}"
            )));
        }
    }

    digits
        .parse::<u16>()
        .map(ReplyCode::new)
        .map_err(|_| Error::MalformedReply(format!("Invalid reply code: {line}")))
}

/// Incremental reply decoder.
///
/// Bytes are appended as they arrive; partial lines stay buffered until
/// their line terminator shows up, and continuation lines are collected
/// until the terminal line of the reply.
#[derive(Debug, Default)]
pub struct ReplyDecoder {
    buffer: BytesMut,
    pending: Vec<String>,
}

impl ReplyDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Mutable access to the receive buffer for direct reads.
    pub const fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Returns true if no partial reply is buffered.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty() && self.pending.is_empty()
    }

    /// Decodes the next complete reply, if one is buffered.
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns an error as soon as a line is malformed, exceeds
    /// [`MAX_LINE_LENGTH`], or the reply grows past [`MAX_REPLY_LINES`].
    pub fn decode(&mut self) -> Result<Option<Reply>> {
        let decoded = self.decode_lines();
        if decoded.is_err() {
            self.pending.clear();
        }
        decoded
    }

    fn decode_lines(&mut self) -> Result<Option<Reply>> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let consumed = self.buffer.split_to(pos + 1);
            let raw = &consumed[..pos];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            if raw.len() > MAX_LINE_LENGTH {
                return Err(Error::MalformedReply("Reply line too long".into()));
            }
            if raw.is_empty() {
                continue;
            }

            let line = String::from_utf8_lossy(raw).into_owned();
            parse_code(&line)?;
            let is_last = is_last_reply_line(&line);
            if !is_last && self.pending.len() + 1 >= MAX_REPLY_LINES {
                return Err(Error::MalformedReply(format!(
                    "Reply exceeds {MAX_REPLY_LINES} lines"
                )));
            }
            self.pending.push(line);

            if is_last {
                let lines = std::mem::take(&mut self.pending);
                return parse_lines(&lines).map(Some);
            }
        }

        if self.buffer.len() > MAX_LINE_LENGTH {
            self.buffer.advance(self.buffer.len());
            return Err(Error::MalformedReply("Reply line too long".into()));
        }

        Ok(None)
    }
}
