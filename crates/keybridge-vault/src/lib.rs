//! Secure note store for Keybridge.
//!
//! This crate stores opaque, named "secure notes" in the operating system's
//! credential vault and reads them back, hiding the payload encoding and the
//! differences between the vault's backends.
//!
//! # Modules
//!
//! - [`kind`] -- keychain kinds and accessibility levels, with explicit parse tables.
//! - [`item`] -- item and query descriptors handed to the vault.
//! - [`backend`] -- the [`VaultBackend`] primitives plus in-memory and unsupported backends.
//! - [`keychain`] -- macOS Keychain Services backend (macOS only).
//! - [`note`] -- property-list note decoding.
//! - [`store`] -- [`SecureNoteStore`], the typed read/write/update/delete API.
//! - [`error`] -- Unified error types.

pub mod backend;
pub mod error;
pub mod item;
#[cfg(target_os = "macos")]
pub mod keychain;
pub mod kind;
pub mod note;
pub mod store;

// Re-export the most commonly used types at the crate root for convenience.
pub use backend::{
    MemoryVault, UnsupportedVault, VaultBackend, platform_backend, platform_backend_at,
};
pub use error::{Result, VaultError};
pub use kind::{Accessibility, KeychainKind};
pub use store::{
    ReadonlyNoteStore, SecureNoteReader, SecureNoteStore, SecureNoteWriter, StoreOptions,
};
