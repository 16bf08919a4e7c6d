//! Plugin protocol error types.
//!
//! Every client-side failure surfaces through [`PluginError`]. The two
//! well-known wire errors are mapped onto their own variants so callers can
//! branch on them without string matching.

/// Errors returned by the plugin client and the wire helpers.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    // -- Classified wire errors ---------------------------------------------
    /// The helper reported that the requested key does not exist.
    #[error("key not found: {key}")]
    KeyNotFound { key: String },

    /// The helper refused to create a key that already exists.
    #[error("key already exists: {key}")]
    KeyExists { key: String },

    /// Any other helper-side failure.
    #[error("plugin error: {message}: {detail}")]
    Plugin {
        message: String,
        detail: String,
        /// Whatever the helper wrote to its diagnostic stream.
        stderr: String,
    },

    // -- Process errors -----------------------------------------------------
    /// The helper binary could not be started.
    #[error("failed to spawn plugin {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The helper did not answer within the configured limit and was killed.
    #[error("timeout: plugin did not respond within {limit_ms}ms")]
    Timeout { limit_ms: u64 },

    /// The response carried a different correlation id than the request.
    #[error("response id {found} does not match request id {expected}")]
    IdMismatch { expected: u64, found: u64 },

    // -- Wrapped errors -----------------------------------------------------
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl PluginError {
    /// Returns `true` for [`PluginError::KeyNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }

    /// Returns `true` for [`PluginError::KeyExists`].
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::KeyExists { .. })
    }
}

/// Convenience alias used throughout the plugin crate.
pub type Result<T> = std::result::Result<T, PluginError>;
