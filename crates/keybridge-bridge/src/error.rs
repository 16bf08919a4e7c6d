//! Bridge error types.
//!
//! Both sides of the bridge report failures through [`BridgeError`]. Errors
//! never carry token values.

use std::process::ExitStatus;

use keybridge_keys::KeysError;

/// Unified error type for the container secret bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    // -- Payload errors -----------------------------------------------------
    /// The credential set on standard input could not be decoded.
    #[error(transparent)]
    Keys(#[from] KeysError),

    // -- Receiver errors ----------------------------------------------------
    /// A key could not be written into the keyring. Installation stops here.
    #[error("failed to write key {key_id:?}: {source}")]
    InstallFailure {
        key_id: String,
        #[source]
        source: std::io::Error,
    },

    /// The entrypoint was started without a target command.
    #[error("no command given to the entrypoint")]
    MissingCommand,

    /// Replacing the process image failed.
    #[error("failed to exec {program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: std::io::Error,
    },

    // -- Sender errors ------------------------------------------------------
    /// The baseline profile is unusable.
    #[error("profile error: {reason}")]
    Profile { reason: String },

    /// The container launcher could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The container launcher exited unsuccessfully.
    #[error("{command} failed: {status}")]
    LauncherFailed { command: String, status: ExitStatus },

    // -- Wrapped errors -----------------------------------------------------
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub(crate) fn profile(reason: impl Into<String>) -> Self {
        Self::Profile {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the bridge crate.
pub type Result<T> = std::result::Result<T, BridgeError>;
