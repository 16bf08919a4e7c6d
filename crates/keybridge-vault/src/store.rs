//! Secure note store.
//!
//! [`SecureNoteStore`] gives typed read/write/update/delete operations on
//! named secure notes for one fixed account, over any [`VaultBackend`].
//!
//! # Semantics
//!
//! - `write` creates an item. An existing item yields
//!   [`VaultError::AlreadyExists`] unless the store was built with
//!   update-in-place, in which case the write falls through to `update`.
//! - `read` returns the note text. With [`KeychainKind::All`] every concrete
//!   kind is probed in [`KeychainKind::CONCRETE`] order and the first hit
//!   wins.
//! - Nothing is cached and nothing is retried; every call goes to the vault.
//!
//! # Example
//!
//! ```rust
//! use keybridge_vault::{KeychainKind, MemoryVault, SecureNoteStore, StoreOptions};
//!
//! # fn example() -> keybridge_vault::Result<()> {
//! let store = SecureNoteStore::new(
//!     MemoryVault::new(),
//!     KeychainKind::File,
//!     "alice",
//!     StoreOptions::default(),
//! );
//! store.write("github-token", b"ghp_...")?;
//! assert_eq!(store.read("github-token")?, b"ghp_...");
//! # Ok(())
//! # }
//! ```

use crate::backend::VaultBackend;
use crate::error::{Result, VaultError};
use crate::item::{ItemQuery, KeychainItem};
use crate::kind::{Accessibility, KeychainKind};
use crate::note;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Construction-time options for a [`SecureNoteStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Turn a duplicate `write` into an `update`.
    ///
    /// Default: **false**.
    pub update_in_place: bool,

    /// Accessibility applied to newly created items.
    ///
    /// Default: **when-unlocked**.
    pub accessibility: Accessibility,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_update_in_place(mut self, update_in_place: bool) -> Self {
        self.update_in_place = update_in_place;
        self
    }

    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read access to secure notes.
pub trait SecureNoteReader {
    fn read_secure_note(&self, service: &str) -> Result<Vec<u8>>;
}

/// Write access to secure notes.
pub trait SecureNoteWriter {
    fn write_secure_note(&self, service: &str, data: &[u8]) -> Result<()>;
    fn update_secure_note(&self, service: &str, data: &[u8]) -> Result<()>;
    fn delete_secure_note(&self, service: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Secure notes for one account in one keychain kind.
pub struct SecureNoteStore<B> {
    backend: B,
    kind: KeychainKind,
    account: String,
    options: StoreOptions,
}

impl<B: VaultBackend> SecureNoteStore<B> {
    /// Create a read/write store.
    pub fn new(
        backend: B,
        kind: KeychainKind,
        account: impl Into<String>,
        options: StoreOptions,
    ) -> Self {
        Self {
            backend,
            kind,
            account: account.into(),
            options,
        }
    }

    /// Create a store that only exposes reads.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::ReadonlyUpdateInPlace`] if `options` requests
    /// update-in-place.
    pub fn readonly(
        backend: B,
        kind: KeychainKind,
        account: impl Into<String>,
        options: StoreOptions,
    ) -> Result<ReadonlyNoteStore<B>> {
        if options.update_in_place {
            return Err(VaultError::ReadonlyUpdateInPlace);
        }
        Ok(ReadonlyNoteStore {
            inner: Self::new(backend, kind, account, options),
        })
    }

    pub fn kind(&self) -> KeychainKind {
        self.kind
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn concrete_kind(&self) -> Result<KeychainKind> {
        if self.kind.is_concrete() {
            Ok(self.kind)
        } else {
            Err(VaultError::AmbiguousKind { kind: self.kind })
        }
    }

    fn query(&self, kind: KeychainKind, service: &str) -> ItemQuery {
        ItemQuery::new(kind, &self.account, service)
    }

    /// Create a new secure note.
    ///
    /// # Errors
    ///
    /// [`VaultError::AlreadyExists`] if the note exists and update-in-place
    /// was not requested.
    pub fn write(&self, service: &str, data: &[u8]) -> Result<()> {
        let kind = self.concrete_kind()?;
        let item = KeychainItem::secure_note(
            kind,
            &self.account,
            service,
            data,
            self.options.accessibility,
        );
        match self.backend.add(&item) {
            Ok(()) => {
                tracing::info!(
                    service,
                    account = %self.account,
                    kind = %kind,
                    accessibility = %self.options.accessibility,
                    "wrote secure note"
                );
                Ok(())
            }
            Err(e) if e.is_already_exists() && self.options.update_in_place => {
                tracing::debug!(service, kind = %kind, "secure note exists, updating in place");
                self.update(service, data)
            }
            Err(e) => Err(e),
        }
    }

    /// Overwrite the payload of an existing secure note.
    pub fn update(&self, service: &str, data: &[u8]) -> Result<()> {
        let kind = self.concrete_kind()?;
        self.backend.update(&self.query(kind, service), data)?;
        tracing::info!(service, account = %self.account, kind = %kind, "updated secure note");
        Ok(())
    }

    /// Read a secure note's text.
    pub fn read(&self, service: &str) -> Result<Vec<u8>> {
        if self.kind.is_concrete() {
            return self.read_kind(self.kind, service);
        }

        let mut first_error: Option<VaultError> = None;
        for kind in KeychainKind::CONCRETE {
            match self.read_kind(kind, service) {
                Ok(data) => return Ok(data),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::debug!(service, kind = %kind, error = %e, "probe failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        Err(first_error.unwrap_or_else(|| VaultError::NotFound {
            service: service.to_owned(),
        }))
    }

    fn read_kind(&self, kind: KeychainKind, service: &str) -> Result<Vec<u8>> {
        let raw = self.backend.query(&self.query(kind, service))?;
        let data = note::decode_note(&raw)?.into_owned();
        tracing::debug!(service, account = %self.account, kind = %kind, "read secure note");
        Ok(data)
    }

    /// Delete a secure note.
    pub fn delete(&self, service: &str) -> Result<()> {
        let kind = self.concrete_kind()?;
        self.backend.delete(&self.query(kind, service))?;
        tracing::info!(service, account = %self.account, kind = %kind, "deleted secure note");
        Ok(())
    }
}

impl<B: VaultBackend> SecureNoteReader for SecureNoteStore<B> {
    fn read_secure_note(&self, service: &str) -> Result<Vec<u8>> {
        self.read(service)
    }
}

impl<B: VaultBackend> SecureNoteWriter for SecureNoteStore<B> {
    fn write_secure_note(&self, service: &str, data: &[u8]) -> Result<()> {
        self.write(service, data)
    }

    fn update_secure_note(&self, service: &str, data: &[u8]) -> Result<()> {
        self.update(service, data)
    }

    fn delete_secure_note(&self, service: &str) -> Result<()> {
        self.delete(service)
    }
}

/// A store restricted to reads. Built with [`SecureNoteStore::readonly`].
pub struct ReadonlyNoteStore<B> {
    inner: SecureNoteStore<B>,
}

impl<B: VaultBackend> ReadonlyNoteStore<B> {
    pub fn read(&self, service: &str) -> Result<Vec<u8>> {
        self.inner.read(service)
    }
}

impl<B: VaultBackend> SecureNoteReader for ReadonlyNoteStore<B> {
    fn read_secure_note(&self, service: &str) -> Result<Vec<u8>> {
        self.inner.read(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryVault;

    fn store(kind: KeychainKind, options: StoreOptions) -> SecureNoteStore<MemoryVault> {
        SecureNoteStore::new(MemoryVault::new(), kind, "alice", options)
    }

    #[test]
    fn write_read_roundtrip() {
        let s = store(KeychainKind::File, StoreOptions::default());
        s.write("svc", b"payload").unwrap();
        assert_eq!(s.read("svc").unwrap(), b"payload");
    }

    #[test]
    fn duplicate_write_without_update_in_place() {
        let s = store(KeychainKind::DataProtection, StoreOptions::default());
        s.write("svc", b"one").unwrap();
        let err = s.write("svc", b"two").unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(s.read("svc").unwrap(), b"one");
    }

    #[test]
    fn duplicate_write_with_update_in_place() {
        let s = store(
            KeychainKind::ICloud,
            StoreOptions::new().with_update_in_place(true),
        );
        s.write("svc", b"one").unwrap();
        s.write("svc", b"two").unwrap();
        assert_eq!(s.read("svc").unwrap(), b"two");
    }

    #[test]
    fn write_applies_accessibility() {
        let s = store(
            KeychainKind::File,
            StoreOptions::new().with_accessibility(Accessibility::AlwaysThisDeviceOnly),
        );
        s.write("svc", b"x").unwrap();
        let q = ItemQuery::new(KeychainKind::File, "alice", "svc");
        assert_eq!(
            s.backend().accessibility_of(&q),
            Some(Accessibility::AlwaysThisDeviceOnly)
        );
    }

    #[test]
    fn update_missing_is_not_found() {
        let s = store(KeychainKind::File, StoreOptions::default());
        assert!(s.update("svc", b"x").unwrap_err().is_not_found());
    }

    #[test]
    fn delete_then_read_is_not_found() {
        let s = store(KeychainKind::File, StoreOptions::default());
        s.write("svc", b"x").unwrap();
        s.delete("svc").unwrap();
        assert!(s.read("svc").unwrap_err().is_not_found());
        assert!(s.delete("svc").unwrap_err().is_not_found());
    }

    #[test]
    fn write_to_all_is_rejected() {
        let s = store(KeychainKind::All, StoreOptions::default());
        assert!(matches!(
            s.write("svc", b"x"),
            Err(VaultError::AmbiguousKind { .. })
        ));
        assert!(matches!(s.delete("svc"), Err(VaultError::AmbiguousKind { .. })));
    }

    #[test]
    fn accounts_are_isolated() {
        let vault = std::sync::Arc::new(MemoryVault::new());
        let alice = SecureNoteStore::new(
            vault.clone(),
            KeychainKind::File,
            "alice",
            StoreOptions::default(),
        );
        let bob = SecureNoteStore::new(vault, KeychainKind::File, "bob", StoreOptions::default());
        alice.write("svc", b"alice").unwrap();
        assert!(bob.read("svc").unwrap_err().is_not_found());
    }

    #[test]
    fn readonly_rejects_update_in_place() {
        let result = SecureNoteStore::readonly(
            MemoryVault::new(),
            KeychainKind::File,
            "alice",
            StoreOptions::new().with_update_in_place(true),
        );
        assert!(matches!(result, Err(VaultError::ReadonlyUpdateInPlace)));
    }
}
