//! macOS Keychain Services backend.
//!
//! Implements [`VaultBackend`] directly on the `SecItem*` calls so that each
//! primitive is a single call with the semantics the store expects:
//!
//! - `add` is one `SecItemAdd`; `errSecDuplicateItem` becomes
//!   [`VaultError::AlreadyExists`]. It never upserts.
//! - `update` is one `SecItemUpdate`; `errSecItemNotFound` becomes
//!   [`VaultError::NotFound`].
//!
//! Kind-specific attributes are applied to every call:
//!
//! - **file**: the legacy file keychains, no extra attributes. A
//!   [`MacosKeychain::open`]ed keychain replaces the default search list.
//! - **data-protection**: `kSecUseDataProtectionKeychain = true`. The calling
//!   binary must be signed with a keychain-access-groups entitlement.
//! - **icloud**: `kSecAttrSynchronizable = true`. Same entitlement rules.
//!
//! # Security Notes
//!
//! - Callers without the entitlement get `errSecMissingEntitlement` (-34018)
//!   from the data-protection and iCloud kinds. That is the reason the plugin
//!   helper exists: an unsigned CLI delegates to a signed helper binary.

use std::path::Path;
use std::ptr;

use core_foundation::array::CFArray;
use core_foundation::base::{CFType, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::data::CFData;
use core_foundation::dictionary::CFDictionary;
use core_foundation::string::{CFString, CFStringRef};
use security_framework::os::macos::keychain::SecKeychain;
use security_framework_sys::access_control::{
    kSecAttrAccessibleAfterFirstUnlock, kSecAttrAccessibleAfterFirstUnlockThisDeviceOnly,
    kSecAttrAccessibleAlways, kSecAttrAccessibleAlwaysThisDeviceOnly,
    kSecAttrAccessibleWhenPasscodeSetThisDeviceOnly, kSecAttrAccessibleWhenUnlocked,
    kSecAttrAccessibleWhenUnlockedThisDeviceOnly,
};
use security_framework_sys::base::{
    OSStatus, errSecDuplicateItem, errSecItemNotFound, errSecParam, errSecSuccess,
};
use security_framework_sys::item::{
    kSecAttrAccount, kSecAttrDescription, kSecAttrService, kSecAttrSynchronizable, kSecClass,
    kSecClassGenericPassword, kSecMatchSearchList, kSecReturnData,
    kSecUseDataProtectionKeychain, kSecUseKeychain, kSecValueData,
};
use security_framework_sys::keychain_item::{
    SecItemAdd, SecItemCopyMatching, SecItemDelete, SecItemUpdate,
};

use crate::backend::VaultBackend;
use crate::error::{Result, VaultError};
use crate::item::{ItemQuery, KeychainItem, KindAttributes};
use crate::kind::Accessibility;

#[link(name = "Security", kind = "framework")]
unsafe extern "C" {
    static kSecAttrAccessible: CFStringRef;
}

type Attributes = Vec<(CFString, CFType)>;

/// Keychain Services backend.
#[derive(Default, Clone)]
pub struct MacosKeychain {
    /// File keychain used for file-kind items instead of the search list.
    keychain: Option<SecKeychain>,
}

impl MacosKeychain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose file-kind items live in the keychain file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let keychain = SecKeychain::open(path).map_err(|e| VaultError::KeychainUnavailable {
            reason: format!("failed to open keychain {}: {e}", path.display()),
        })?;
        Ok(Self {
            keychain: Some(keychain),
        })
    }

    /// The opened keychain, for kinds that live in file keychains.
    fn file_keychain(&self, attributes: &KindAttributes) -> Option<&SecKeychain> {
        if attributes.data_protection || attributes.synchronizable {
            None
        } else {
            self.keychain.as_ref()
        }
    }

    /// Class, service, account and the kind attributes.
    fn base_attributes(account: &str, service: &str, attributes: &KindAttributes) -> Attributes {
        let mut pairs = vec![
            (key(unsafe { kSecClass }), key(unsafe { kSecClassGenericPassword }).into_CFType()),
            (key(unsafe { kSecAttrService }), CFString::new(service).into_CFType()),
            (key(unsafe { kSecAttrAccount }), CFString::new(account).into_CFType()),
        ];
        if attributes.data_protection {
            pairs.push((
                key(unsafe { kSecUseDataProtectionKeychain }),
                CFBoolean::true_value().into_CFType(),
            ));
        }
        if attributes.synchronizable {
            pairs.push((
                key(unsafe { kSecAttrSynchronizable }),
                CFBoolean::true_value().into_CFType(),
            ));
        }
        pairs
    }

    fn add_attributes(&self, item: &KeychainItem) -> Attributes {
        let mut pairs = Self::base_attributes(&item.account, &item.service, &item.attributes);
        pairs.push((
            key(unsafe { kSecAttrDescription }),
            CFString::new(&item.description).into_CFType(),
        ));
        if let Some(level) = accessible(item.accessibility) {
            pairs.push((key(unsafe { kSecAttrAccessible }), key(level).into_CFType()));
        }
        if let Some(keychain) = self.file_keychain(&item.attributes) {
            pairs.push((key(unsafe { kSecUseKeychain }), keychain.as_CFType()));
        }
        pairs.push((
            key(unsafe { kSecValueData }),
            CFData::from_buffer(&item.data).into_CFType(),
        ));
        pairs
    }

    fn query_attributes(&self, query: &ItemQuery) -> Attributes {
        let mut pairs = Self::base_attributes(&query.account, &query.service, &query.attributes);
        if let Some(keychain) = self.file_keychain(&query.attributes) {
            let search_list = CFArray::from_CFTypes(&[keychain.clone()]);
            pairs.push((key(unsafe { kSecMatchSearchList }), search_list.into_CFType()));
        }
        pairs
    }
}

/// Wrap one of the framework's constant strings.
fn key(name: CFStringRef) -> CFString {
    // SAFETY: the Security constants are static CFStrings that live for the
    // whole process.
    unsafe { CFString::wrap_under_get_rule(name) }
}

/// `kSecAttrAccessible` value for `accessibility`. `Default` leaves the
/// attribute unset.
fn accessible(accessibility: Accessibility) -> Option<CFStringRef> {
    // SAFETY: reads of immutable framework statics.
    unsafe {
        match accessibility {
            Accessibility::Default => None,
            Accessibility::WhenUnlocked => Some(kSecAttrAccessibleWhenUnlocked),
            Accessibility::AfterFirstUnlock => Some(kSecAttrAccessibleAfterFirstUnlock),
            Accessibility::Always => Some(kSecAttrAccessibleAlways),
            Accessibility::WhenPasscodeSetThisDeviceOnly => {
                Some(kSecAttrAccessibleWhenPasscodeSetThisDeviceOnly)
            }
            Accessibility::WhenUnlockedThisDeviceOnly => {
                Some(kSecAttrAccessibleWhenUnlockedThisDeviceOnly)
            }
            Accessibility::AfterFirstUnlockThisDeviceOnly => {
                Some(kSecAttrAccessibleAfterFirstUnlockThisDeviceOnly)
            }
            Accessibility::AlwaysThisDeviceOnly => Some(kSecAttrAccessibleAlwaysThisDeviceOnly),
        }
    }
}

fn check(status: OSStatus, service: &str) -> Result<()> {
    if status == errSecSuccess {
        Ok(())
    } else {
        Err(map_status(status, service))
    }
}

fn map_status(status: OSStatus, service: &str) -> VaultError {
    match status {
        errSecItemNotFound => VaultError::NotFound {
            service: service.to_owned(),
        },
        errSecDuplicateItem => VaultError::AlreadyExists {
            service: service.to_owned(),
        },
        code => VaultError::Os {
            code,
            message: security_framework::base::Error::from_code(code).to_string(),
        },
    }
}

impl VaultBackend for MacosKeychain {
    fn add(&self, item: &KeychainItem) -> Result<()> {
        let attributes = CFDictionary::from_CFType_pairs(&self.add_attributes(item));
        // SAFETY: the dictionary outlives the call and no result is requested.
        let status = unsafe { SecItemAdd(attributes.as_concrete_TypeRef(), ptr::null_mut()) };
        check(status, &item.service)?;

        tracing::debug!(service = %item.service, "added item to macOS keychain");
        Ok(())
    }

    fn update(&self, query: &ItemQuery, data: &[u8]) -> Result<()> {
        let matching = CFDictionary::from_CFType_pairs(&self.query_attributes(query));
        let changes = CFDictionary::from_CFType_pairs(&[(
            key(unsafe { kSecValueData }),
            CFData::from_buffer(data).into_CFType(),
        )]);
        // SAFETY: both dictionaries outlive the call.
        let status = unsafe {
            SecItemUpdate(matching.as_concrete_TypeRef(), changes.as_concrete_TypeRef())
        };
        check(status, &query.service)?;

        tracing::debug!(service = %query.service, "updated item in macOS keychain");
        Ok(())
    }

    fn query(&self, query: &ItemQuery) -> Result<Vec<u8>> {
        let mut pairs = self.query_attributes(query);
        pairs.push((key(unsafe { kSecReturnData }), CFBoolean::true_value().into_CFType()));
        let matching = CFDictionary::from_CFType_pairs(&pairs);

        let mut result: CFTypeRef = ptr::null();
        // SAFETY: on success `result` holds a +1 reference owned by us.
        let status = unsafe { SecItemCopyMatching(matching.as_concrete_TypeRef(), &mut result) };
        check(status, &query.service)?;
        if result.is_null() {
            return Err(map_status(errSecParam, &query.service));
        }

        // SAFETY: `result` is non-null and follows the create rule.
        let value = unsafe { CFType::wrap_under_create_rule(result) };
        value
            .downcast_into::<CFData>()
            .map(|data| data.bytes().to_vec())
            .ok_or_else(|| map_status(errSecParam, &query.service))
    }

    fn delete(&self, query: &ItemQuery) -> Result<()> {
        let matching = CFDictionary::from_CFType_pairs(&self.query_attributes(query));
        // SAFETY: the dictionary outlives the call.
        let status = unsafe { SecItemDelete(matching.as_concrete_TypeRef()) };
        check(status, &query.service)?;

        tracing::debug!(service = %query.service, "deleted item from macOS keychain");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "macos-keychain"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::item::SECURE_NOTE_DESCRIPTION;
    use crate::kind::KeychainKind;

    fn value_of(pairs: &Attributes, name: CFStringRef) -> Option<CFType> {
        let wanted = key(name);
        pairs.iter().find(|(k, _)| *k == wanted).map(|(_, v)| v.clone())
    }

    #[test]
    fn accessible_covers_every_level() {
        assert_eq!(accessible(Accessibility::Default), None);
        assert_eq!(
            accessible(Accessibility::WhenUnlocked),
            Some(unsafe { kSecAttrAccessibleWhenUnlocked })
        );
        assert_eq!(
            accessible(Accessibility::AlwaysThisDeviceOnly),
            Some(unsafe { kSecAttrAccessibleAlwaysThisDeviceOnly })
        );

        let distinct: HashSet<CFStringRef> = Accessibility::ALL
            .iter()
            .filter_map(|a| accessible(*a))
            .collect();
        assert_eq!(distinct.len(), 7);
    }

    #[test]
    fn add_sets_accessible_and_description() {
        let item = KeychainItem::secure_note(
            KeychainKind::File,
            "alice",
            "svc",
            b"data",
            Accessibility::Always,
        );
        let pairs = MacosKeychain::new().add_attributes(&item);

        let level = value_of(&pairs, unsafe { kSecAttrAccessible })
            .and_then(|v| v.downcast_into::<CFString>())
            .unwrap();
        assert_eq!(level, key(unsafe { kSecAttrAccessibleAlways }));

        let description = value_of(&pairs, unsafe { kSecAttrDescription })
            .and_then(|v| v.downcast_into::<CFString>())
            .unwrap();
        assert_eq!(description.to_string(), SECURE_NOTE_DESCRIPTION);

        let access_control = unsafe { security_framework_sys::item::kSecAttrAccessControl };
        assert!(value_of(&pairs, access_control).is_none());
    }

    #[test]
    fn default_accessibility_is_left_unset() {
        let item = KeychainItem::secure_note(
            KeychainKind::File,
            "alice",
            "svc",
            b"data",
            Accessibility::Default,
        );
        let pairs = MacosKeychain::new().add_attributes(&item);
        assert!(value_of(&pairs, unsafe { kSecAttrAccessible }).is_none());
    }

    #[test]
    fn kind_attributes_reach_the_query() {
        let query = ItemQuery::new(KeychainKind::ICloud, "alice", "svc");
        let pairs = MacosKeychain::new().query_attributes(&query);
        assert!(value_of(&pairs, unsafe { kSecAttrSynchronizable }).is_some());
        assert!(value_of(&pairs, unsafe { kSecUseDataProtectionKeychain }).is_none());
        assert!(value_of(&pairs, unsafe { kSecMatchSearchList }).is_none());
    }

    #[test]
    fn status_mapping() {
        assert!(map_status(errSecDuplicateItem, "svc").is_already_exists());
        assert!(map_status(errSecItemNotFound, "svc").is_not_found());
        assert!(matches!(
            map_status(-34018, "svc"),
            VaultError::Os { code: -34018, .. }
        ));
    }

    /// Round-trip against the real login keychain. CI keychains are usually
    /// locked, so this is ignored by default.
    #[test]
    #[ignore = "requires unlocked macOS Keychain -- run manually with --ignored"]
    fn macos_keychain_roundtrip() {
        let kc = MacosKeychain::new();
        let service = format!("keybridge.test.{}", std::process::id());
        let item = KeychainItem::secure_note(
            KeychainKind::File,
            "keybridge-test",
            &service,
            b"value",
            Accessibility::WhenUnlocked,
        );
        let _ = kc.delete(&item.query());

        assert!(kc.update(&item.query(), b"nothing").unwrap_err().is_not_found());
        kc.add(&item).unwrap();
        assert!(kc.add(&item).unwrap_err().is_already_exists());
        assert_eq!(kc.query(&item.query()).unwrap(), b"value");

        kc.update(&item.query(), b"value2").unwrap();
        assert_eq!(kc.query(&item.query()).unwrap(), b"value2");

        kc.delete(&item.query()).unwrap();
        assert!(kc.query(&item.query()).unwrap_err().is_not_found());
    }
}
