//! Vault error types.
//!
//! All secure note operations surface errors through [`VaultError`]. The two
//! variants callers routinely branch on, [`VaultError::NotFound`] and
//! [`VaultError::AlreadyExists`], have dedicated predicates so that callers
//! never need to match on message text.

use crate::kind::KeychainKind;

/// Unified error type for the Keybridge secure note store.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    // -- Item lookup --------------------------------------------------------
    /// No item matched the (account, service) pair.
    #[error("secure note not found: service={service}")]
    NotFound { service: String },

    /// An item with the same (account, service) pair already exists.
    #[error("secure note already exists: service={service}")]
    AlreadyExists { service: String },

    // -- Store configuration ------------------------------------------------
    /// A write-side operation was attempted against the virtual `all` kind.
    #[error("write operations need a concrete keychain kind, got {kind}")]
    AmbiguousKind { kind: KeychainKind },

    /// A readonly store was constructed with update-in-place requested.
    #[error("update-in-place cannot be requested for a readonly store")]
    ReadonlyUpdateInPlace,

    /// A keychain kind or accessibility name was not in the parse table.
    #[error("invalid {what}: {value}")]
    InvalidName { what: &'static str, value: String },

    // -- Payload ------------------------------------------------------------
    /// The stored payload looked like a property list but could not be used.
    #[error("malformed secure note document: {reason}")]
    MalformedNote { reason: String },

    // -- Backend ------------------------------------------------------------
    /// The backend is unavailable or unsupported on this platform.
    #[error("keychain unavailable: {reason}")]
    KeychainUnavailable { reason: String },

    /// The OS vault rejected the operation.
    #[error("keychain error {code}: {message}")]
    Os { code: i32, message: String },
}

impl VaultError {
    /// Returns `true` for [`VaultError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for [`VaultError::AlreadyExists`].
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;
