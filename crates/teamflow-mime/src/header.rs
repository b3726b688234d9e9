//! MIME header handling.

use std::fmt;

use crate::error::{Error, Result};

/// Ordered collection of header fields.
///
/// Fields render in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the value contains a CR or LF
    /// that is not part of a fold (CRLF followed by a space or tab).
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        if !breaks_are_folds(&value) {
            return Err(Error::InvalidHeader { name });
        }
        self.fields.push((name, value));
        Ok(())
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Every CR or LF must belong to a CRLF followed by a space or tab.
fn breaks_are_folds(value: &str) -> bool {
    let bytes = value.as_bytes();
    let folds_at = |crlf: usize| {
        bytes.get(crlf..crlf + 2) == Some(b"\r\n".as_slice())
            && matches!(bytes.get(crlf + 2), Some(b' ' | b'\t'))
    };
    bytes.iter().enumerate().all(|(i, b)| match b {
        b'\r' => folds_at(i),
        b'\n' => i.checked_sub(1).is_some_and(folds_at),
        _ => true,
    })
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.fields {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}
