use crate::{Error, Result};
use core::fmt;

/// Longest accepted scope or sequence name, in bytes.
pub const MAX_NAME_LEN: usize = 128;

/// The `(scope, sequence)` tuple identifying one independent counter stream.
///
/// The authority id is implicit: an allocation engine serves exactly one
/// authority, so its sequence keys only carry the two names. Keys are created
/// lazily on first allocation; no prior registration is needed.
///
/// Names double as durable path components on disk locations, so they are
/// validated up front: non-empty, at most [`MAX_NAME_LEN`] bytes, no path
/// separators, no control characters, and not `.`/`..`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SequenceKey {
    scope: String,
    sequence: String,
}

impl SequenceKey {
    /// Validates both names and builds a key.
    pub fn new(scope: impl Into<String>, sequence: impl Into<String>) -> Result<Self> {
        let scope = scope.into();
        let sequence = sequence.into();
        validate_name("scope", &scope)?;
        validate_name("sequence", &sequence)?;
        Ok(Self { scope, sequence })
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.sequence)
    }
}

fn validate_name(field: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid(format!("{field} name must be non-empty")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::invalid(format!(
            "{field} name exceeds {MAX_NAME_LEN} bytes"
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::invalid(format!(
            "{field} name must not be a relative path component"
        )));
    }
    if name
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return Err(Error::invalid(format!(
            "{field} name contains a path separator or control character"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        let key = SequenceKey::new("orders", "invoice").unwrap();
        assert_eq!(key.scope(), "orders");
        assert_eq!(key.sequence(), "invoice");
        assert_eq!(key.to_string(), "orders/invoice");
    }

    #[test]
    fn rejects_empty_and_oversized_names() {
        assert!(SequenceKey::new("", "invoice").is_err());
        assert!(SequenceKey::new("orders", "").is_err());
        assert!(SequenceKey::new("a".repeat(MAX_NAME_LEN + 1), "x").is_err());
    }

    #[test]
    fn rejects_path_like_names() {
        for bad in ["a/b", "a\\b", ".", "..", "nul\0char", "tab\tchar"] {
            assert!(
                SequenceKey::new(bad, "x").is_err(),
                "expected rejection of {bad:?}"
            );
        }
    }
}
