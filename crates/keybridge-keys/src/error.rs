//! Credential set error types.

/// Unified error type for credential sets and their transport codec.
#[derive(Debug, thiserror::Error)]
pub enum KeysError {
    /// The envelope carried a format tag this decoder does not understand.
    #[error("unknown credential set format: {found:?}")]
    Format { found: String },

    /// The envelope or its payload could not be parsed.
    #[error("malformed credential set: {reason}")]
    Parse { reason: String },

    /// A key id appeared twice in one set.
    #[error("duplicate key id: {key_id}")]
    DuplicateKey { key_id: String },

    /// The requested key id is not in the set.
    #[error("key not found: {key_id}")]
    KeyNotFound { key_id: String },

    /// Serializing a set failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading or writing the transport stream failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl KeysError {
    pub(crate) fn parse(reason: impl std::fmt::Display) -> Self {
        Self::Parse {
            reason: reason.to_string(),
        }
    }
}

/// Convenience alias used throughout the keys crate.
pub type Result<T> = std::result::Result<T, KeysError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_display_quotes_tag() {
        let err = KeysError::Format {
            found: "yaml_keys".into(),
        };
        assert_eq!(err.to_string(), "unknown credential set format: \"yaml_keys\"");
    }

    #[test]
    fn duplicate_key_display() {
        let err = KeysError::DuplicateKey {
            key_id: "k1".into(),
        };
        assert_eq!(err.to_string(), "duplicate key id: k1");
    }
}
