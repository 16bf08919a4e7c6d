//! Native vault primitives.
//!
//! [`VaultBackend`] is the seam between the secure note semantics in
//! [`crate::store`] and whatever credential store the platform provides. A
//! backend only has to implement the four raw operations and report the two
//! outcomes the store branches on:
//!
//! - `add` on an existing (account, service) pair → [`VaultError::AlreadyExists`]
//! - `update`, `query` or `delete` on a missing pair → [`VaultError::NotFound`]
//!
//! The duplicate-item error from `add` is also the only race detection the
//! store relies on; backends must not upsert silently.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use zeroize::Zeroizing;

use crate::error::{Result, VaultError};
use crate::item::{ItemQuery, KeychainItem, KindAttributes};
use crate::kind::{Accessibility, KeychainKind};

/// OS status for a caller missing the keychain-access-groups entitlement
/// (`errSecMissingEntitlement`).
pub const ERR_SEC_MISSING_ENTITLEMENT: i32 = -34018;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Raw vault primitives.
///
/// Implementations must be `Send + Sync` so a store can be shared with the
/// plugin server.
pub trait VaultBackend: Send + Sync {
    /// Insert a new item.
    fn add(&self, item: &KeychainItem) -> Result<()>;

    /// Replace the payload of the item located by `query`.
    fn update(&self, query: &ItemQuery, data: &[u8]) -> Result<()>;

    /// Return the payload of the single item located by `query`.
    fn query(&self, query: &ItemQuery) -> Result<Vec<u8>>;

    /// Remove the item located by `query`.
    fn delete(&self, query: &ItemQuery) -> Result<()>;

    /// Short name used in log events.
    fn name(&self) -> &'static str;
}

impl<B: VaultBackend + ?Sized> VaultBackend for &B {
    fn add(&self, item: &KeychainItem) -> Result<()> {
        (**self).add(item)
    }

    fn update(&self, query: &ItemQuery, data: &[u8]) -> Result<()> {
        (**self).update(query, data)
    }

    fn query(&self, query: &ItemQuery) -> Result<Vec<u8>> {
        (**self).query(query)
    }

    fn delete(&self, query: &ItemQuery) -> Result<()> {
        (**self).delete(query)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<B: VaultBackend + ?Sized> VaultBackend for Box<B> {
    fn add(&self, item: &KeychainItem) -> Result<()> {
        (**self).add(item)
    }

    fn update(&self, query: &ItemQuery, data: &[u8]) -> Result<()> {
        (**self).update(query, data)
    }

    fn query(&self, query: &ItemQuery) -> Result<Vec<u8>> {
        (**self).query(query)
    }

    fn delete(&self, query: &ItemQuery) -> Result<()> {
        (**self).delete(query)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<B: VaultBackend + ?Sized> VaultBackend for std::sync::Arc<B> {
    fn add(&self, item: &KeychainItem) -> Result<()> {
        (**self).add(item)
    }

    fn update(&self, query: &ItemQuery, data: &[u8]) -> Result<()> {
        (**self).update(query, data)
    }

    fn query(&self, query: &ItemQuery) -> Result<Vec<u8>> {
        (**self).query(query)
    }

    fn delete(&self, query: &ItemQuery) -> Result<()> {
        (**self).delete(query)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

type ItemKey = (KindAttributes, String, String);

#[derive(Clone)]
struct StoredItem {
    data: Zeroizing<Vec<u8>>,
    accessibility: Accessibility,
}

/// In-process vault with one partition per concrete keychain kind.
///
/// Useful for tests and dry runs. Individual kinds can be marked unavailable
/// to model a caller that lacks the entitlement a backend requires.
#[derive(Default)]
pub struct MemoryVault {
    items: Mutex<HashMap<ItemKey, StoredItem>>,
    unavailable: Vec<KindAttributes>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation against `kind` fails with a missing-entitlement error.
    pub fn with_unavailable(mut self, kind: KeychainKind) -> Self {
        self.unavailable.push(KindAttributes::for_kind(kind));
        self
    }

    /// Number of stored items across all kinds.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Accessibility recorded for an item, if present.
    pub fn accessibility_of(&self, query: &ItemQuery) -> Option<Accessibility> {
        self.lock().get(&key_of(query)).map(|s| s.accessibility)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ItemKey, StoredItem>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self, attributes: &KindAttributes) -> Result<()> {
        if self.unavailable.contains(attributes) {
            return Err(VaultError::Os {
                code: ERR_SEC_MISSING_ENTITLEMENT,
                message: "a required entitlement isn't present".into(),
            });
        }
        Ok(())
    }
}

fn key_of(query: &ItemQuery) -> ItemKey {
    (
        query.attributes,
        query.account.clone(),
        query.service.clone(),
    )
}

fn not_found(query: &ItemQuery) -> VaultError {
    VaultError::NotFound {
        service: query.service.clone(),
    }
}

impl VaultBackend for MemoryVault {
    fn add(&self, item: &KeychainItem) -> Result<()> {
        self.check_available(&item.attributes)?;
        let mut items = self.lock();
        let key = key_of(&item.query());
        if items.contains_key(&key) {
            return Err(VaultError::AlreadyExists {
                service: item.service.clone(),
            });
        }
        items.insert(
            key,
            StoredItem {
                data: item.data.clone(),
                accessibility: item.accessibility,
            },
        );
        Ok(())
    }

    fn update(&self, query: &ItemQuery, data: &[u8]) -> Result<()> {
        self.check_available(&query.attributes)?;
        let mut items = self.lock();
        let stored = items.get_mut(&key_of(query)).ok_or_else(|| not_found(query))?;
        stored.data = Zeroizing::new(data.to_vec());
        Ok(())
    }

    fn query(&self, query: &ItemQuery) -> Result<Vec<u8>> {
        self.check_available(&query.attributes)?;
        self.lock()
            .get(&key_of(query))
            .map(|s| s.data.to_vec())
            .ok_or_else(|| not_found(query))
    }

    fn delete(&self, query: &ItemQuery) -> Result<()> {
        self.check_available(&query.attributes)?;
        self.lock()
            .remove(&key_of(query))
            .map(|_| ())
            .ok_or_else(|| not_found(query))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// ---------------------------------------------------------------------------
// Unsupported platforms
// ---------------------------------------------------------------------------

/// Backend for platforms without a supported OS vault. Every operation fails
/// with [`VaultError::KeychainUnavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedVault;

impl UnsupportedVault {
    fn unavailable<T>(&self) -> Result<T> {
        Err(VaultError::KeychainUnavailable {
            reason: format!(
                "no secure note vault is available on {}",
                std::env::consts::OS
            ),
        })
    }
}

impl VaultBackend for UnsupportedVault {
    fn add(&self, _item: &KeychainItem) -> Result<()> {
        self.unavailable()
    }

    fn update(&self, _query: &ItemQuery, _data: &[u8]) -> Result<()> {
        self.unavailable()
    }

    fn query(&self, _query: &ItemQuery) -> Result<Vec<u8>> {
        self.unavailable()
    }

    fn delete(&self, _query: &ItemQuery) -> Result<()> {
        self.unavailable()
    }

    fn name(&self) -> &'static str {
        "unsupported"
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Returns the OS vault for the current platform.
///
/// - **macOS**: [`crate::keychain::MacosKeychain`] (Keychain Services)
/// - **Other platforms**: [`UnsupportedVault`]
pub fn platform_backend() -> Box<dyn VaultBackend> {
    #[cfg(target_os = "macos")]
    {
        tracing::debug!("using macOS Keychain Services");
        Box::new(crate::keychain::MacosKeychain::new())
    }
    #[cfg(not(target_os = "macos"))]
    {
        tracing::debug!(os = std::env::consts::OS, "no OS vault on this platform");
        Box::new(UnsupportedVault)
    }
}

/// Like [`platform_backend`], with file-kind items kept in the keychain file
/// at `keychain_path` when one is given.
///
/// Fails with [`VaultError::KeychainUnavailable`] when the file cannot be
/// opened. Platforms without a vault ignore the path.
pub fn platform_backend_at(keychain_path: Option<&Path>) -> Result<Box<dyn VaultBackend>> {
    let Some(path) = keychain_path else {
        return Ok(platform_backend());
    };
    #[cfg(target_os = "macos")]
    {
        tracing::debug!(keychain_path = %path.display(), "using macOS Keychain Services");
        Ok(Box::new(crate::keychain::MacosKeychain::open(path)?))
    }
    #[cfg(not(target_os = "macos"))]
    {
        tracing::debug!(keychain_path = %path.display(), "keychain path ignored on this platform");
        Ok(Box::new(UnsupportedVault))
    }
}
