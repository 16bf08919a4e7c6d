//! Vault item and query descriptors.
//!
//! These mirror the attribute dictionaries handed to the native vault
//! primitives. A store derives both from its concrete [`KeychainKind`], so the
//! kind-specific attributes (synchronization, data protection) are always set
//! the same way for writes and for the queries that find those writes again.

use zeroize::Zeroizing;

use crate::kind::{Accessibility, KeychainKind};

/// Description attached to every item the store creates.
pub const SECURE_NOTE_DESCRIPTION: &str = "secure note";

/// Security class of a vault item. Secure notes are stored as generic
/// passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecClass {
    GenericPassword,
}

/// How many items a query may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchLimit {
    One,
}

/// Kind-specific attributes shared by items and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KindAttributes {
    pub synchronizable: bool,
    pub data_protection: bool,
}

impl KindAttributes {
    /// Attributes for a concrete kind. `All` carries none; callers must
    /// resolve it to a concrete kind first.
    pub fn for_kind(kind: KeychainKind) -> Self {
        match kind {
            KeychainKind::File | KeychainKind::All => Self {
                synchronizable: false,
                data_protection: false,
            },
            KeychainKind::DataProtection => Self {
                synchronizable: false,
                data_protection: true,
            },
            KeychainKind::ICloud => Self {
                synchronizable: true,
                data_protection: false,
            },
        }
    }
}

/// A new item to insert into the vault.
#[derive(Clone, PartialEq, Eq)]
pub struct KeychainItem {
    pub class: SecClass,
    pub account: String,
    pub service: String,
    pub description: String,
    /// Payload. Wiped when the item is dropped.
    pub data: Zeroizing<Vec<u8>>,
    pub accessibility: Accessibility,
    pub attributes: KindAttributes,
}

// Keep payload bytes out of debug output.
impl std::fmt::Debug for KeychainItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeychainItem")
            .field("class", &self.class)
            .field("account", &self.account)
            .field("service", &self.service)
            .field("description", &self.description)
            .field("data_len", &self.data.len())
            .field("accessibility", &self.accessibility)
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// Locates existing items by (account, service) within one concrete kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub class: SecClass,
    pub account: String,
    pub service: String,
    pub attributes: KindAttributes,
    pub match_limit: MatchLimit,
}

impl ItemQuery {
    pub fn new(kind: KeychainKind, account: &str, service: &str) -> Self {
        Self {
            class: SecClass::GenericPassword,
            account: account.to_owned(),
            service: service.to_owned(),
            attributes: KindAttributes::for_kind(kind),
            match_limit: MatchLimit::One,
        }
    }
}

impl KeychainItem {
    pub fn secure_note(
        kind: KeychainKind,
        account: &str,
        service: &str,
        data: &[u8],
        accessibility: Accessibility,
    ) -> Self {
        Self {
            class: SecClass::GenericPassword,
            account: account.to_owned(),
            service: service.to_owned(),
            description: SECURE_NOTE_DESCRIPTION.to_owned(),
            data: Zeroizing::new(data.to_vec()),
            accessibility,
            attributes: KindAttributes::for_kind(kind),
        }
    }

    /// The query that would find this item.
    pub fn query(&self) -> ItemQuery {
        ItemQuery {
            class: self.class,
            account: self.account.clone(),
            service: self.service.clone(),
            attributes: self.attributes,
            match_limit: MatchLimit::One,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_attributes() {
        assert_eq!(
            KindAttributes::for_kind(KeychainKind::DataProtection),
            KindAttributes {
                synchronizable: false,
                data_protection: true
            }
        );
        assert!(KindAttributes::for_kind(KeychainKind::ICloud).synchronizable);
        assert!(!KindAttributes::for_kind(KeychainKind::File).data_protection);
    }

    #[test]
    fn item_query_matches_item() {
        let item = KeychainItem::secure_note(
            KeychainKind::ICloud,
            "alice",
            "svc",
            b"data",
            Accessibility::Always,
        );
        assert_eq!(item.query(), ItemQuery::new(KeychainKind::ICloud, "alice", "svc"));
        assert_eq!(item.description, SECURE_NOTE_DESCRIPTION);
    }

    #[test]
    fn payload_is_held_in_a_zeroizing_buffer() {
        let item = KeychainItem::secure_note(
            KeychainKind::File,
            "alice",
            "svc",
            b"hunter2",
            Accessibility::default(),
        );
        let data: &Zeroizing<Vec<u8>> = &item.data;
        assert_eq!(data.as_slice(), b"hunter2");
    }

    #[test]
    fn debug_hides_payload() {
        let item = KeychainItem::secure_note(
            KeychainKind::File,
            "alice",
            "svc",
            b"hunter2",
            Accessibility::default(),
        );
        let dbg = format!("{item:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("data_len: 7"));
    }
}
