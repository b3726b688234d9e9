//! Multipart boundary tokens.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generates a boundary token unique within this process.
///
/// The token mixes the wall clock, the process id and a process-wide
/// counter, so concurrent sends never share a boundary. It uses only
/// characters that need no quoting in a `Content-Type` parameter.
#[must_use]
pub fn generate() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("teamflow-{nanos:x}-{:x}-{seq:x}", std::process::id())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_boundaries_are_unique() {
        let tokens: HashSet<String> = (0..1000).map(|_| generate()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_boundary_is_token_safe() {
        let token = generate();
        assert!(token.len() <= 70);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        );
    }
}
