//! Header encodings.
//!
//! Bodies travel as raw UTF-8; only header words are ever encoded.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Charset label used for every encoded word.
pub const UTF_8: &str = "utf-8";

/// Longest encoded word allowed by RFC 2047, delimiters included.
pub const MAX_ENCODED_WORD_LENGTH: usize = 75;

/// Separator between encoded words of one header value.
pub const FOLD: &str = "\r\n ";

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Returns `true` if `text` can go into a header verbatim.
#[must_use]
pub fn is_header_safe(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) && !text.contains("=?")
}

/// Encodes a header value as RFC 2047 `B` encoded words when needed.
///
/// Plain printable ASCII is returned unchanged. Anything else, including
/// text that would itself look like an encoded word, becomes one or more
/// `=?charset?B?...?=` words of at most [`MAX_ENCODED_WORD_LENGTH`]
/// characters, joined by [`FOLD`]. Words split on character boundaries so
/// each decodes on its own.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if is_header_safe(text) {
        return text.to_string();
    }

    let budget = chunk_budget(charset);
    chunks(text, budget)
        .map(|chunk| format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes())))
        .collect::<Vec<_>>()
        .join(FOLD)
}

/// Raw bytes that fit one encoded word once Base64 expands them.
fn chunk_budget(charset: &str) -> usize {
    // "=?" charset "?B?" payload "?="
    let overhead = charset.len() + 7;
    let payload = MAX_ENCODED_WORD_LENGTH.saturating_sub(overhead);
    // A UTF-8 character is at most 4 bytes; never go below one of them.
    (payload / 4 * 3).max(4)
}

fn chunks(text: &str, budget: usize) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let mut end = rest.len().min(budget);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}
