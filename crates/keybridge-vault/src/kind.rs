//! Keychain kinds and item accessibility levels.
//!
//! Both enums are parsed through explicit tables: every accepted spelling is
//! listed once and maps to exactly one canonical variant. Serialization always
//! uses the canonical spelling.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

// ---------------------------------------------------------------------------
// KeychainKind
// ---------------------------------------------------------------------------

/// Which vault backend an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeychainKind {
    /// Legacy, local-only, file based keychain.
    File,
    /// Local keychain integrated with device unlock. Callers must be signed
    /// and carry the keychain-access-groups entitlement.
    DataProtection,
    /// Keychain synchronized across devices. Requires the same entitlement.
    ICloud,
    /// Virtual kind used only for reads: probe every concrete kind in
    /// [`KeychainKind::CONCRETE`] order and return the first hit.
    All,
}

/// Parse table for [`KeychainKind`]. Aliases sit next to their canonical
/// spelling, which always comes first.
const KIND_NAMES: &[(&str, KeychainKind)] = &[
    ("file", KeychainKind::File),
    ("default", KeychainKind::File),
    ("data-protection", KeychainKind::DataProtection),
    ("data-protection-local", KeychainKind::DataProtection),
    ("local", KeychainKind::DataProtection),
    ("icloud", KeychainKind::ICloud),
    ("all", KeychainKind::All),
];

impl KeychainKind {
    /// Probe order used when reading with [`KeychainKind::All`].
    pub const CONCRETE: [KeychainKind; 3] = [Self::File, Self::DataProtection, Self::ICloud];

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::DataProtection => "data-protection",
            Self::ICloud => "icloud",
            Self::All => "all",
        }
    }

    /// Parse any accepted spelling.
    pub fn parse(s: &str) -> Result<Self> {
        KIND_NAMES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| VaultError::InvalidName {
                what: "keychain kind",
                value: s.to_owned(),
            })
    }

    /// `true` for every kind except [`KeychainKind::All`].
    pub fn is_concrete(&self) -> bool {
        !matches!(self, Self::All)
    }
}

impl Default for KeychainKind {
    fn default() -> Self {
        Self::File
    }
}

impl std::fmt::Display for KeychainKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for KeychainKind {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for KeychainKind {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<KeychainKind> for String {
    fn from(kind: KeychainKind) -> Self {
        kind.as_str().to_owned()
    }
}

// ---------------------------------------------------------------------------
// Accessibility
// ---------------------------------------------------------------------------

/// When the OS will release an item's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Accessibility {
    Default,
    WhenUnlocked,
    AfterFirstUnlock,
    Always,
    WhenPasscodeSetThisDeviceOnly,
    WhenUnlockedThisDeviceOnly,
    AfterFirstUnlockThisDeviceOnly,
    AlwaysThisDeviceOnly,
}

const ACCESSIBILITY_NAMES: &[(&str, Accessibility)] = &[
    ("default", Accessibility::Default),
    ("when-unlocked", Accessibility::WhenUnlocked),
    ("after-first-unlock", Accessibility::AfterFirstUnlock),
    ("always", Accessibility::Always),
    (
        "when-passcode-set-this-device-only",
        Accessibility::WhenPasscodeSetThisDeviceOnly,
    ),
    (
        "when-unlocked-this-device-only",
        Accessibility::WhenUnlockedThisDeviceOnly,
    ),
    (
        "after-first-unlock-this-device-only",
        Accessibility::AfterFirstUnlockThisDeviceOnly,
    ),
    ("always-this-device-only", Accessibility::AlwaysThisDeviceOnly),
];

impl Accessibility {
    /// Every level, in declaration order.
    pub const ALL: [Accessibility; 8] = [
        Self::Default,
        Self::WhenUnlocked,
        Self::AfterFirstUnlock,
        Self::Always,
        Self::WhenPasscodeSetThisDeviceOnly,
        Self::WhenUnlockedThisDeviceOnly,
        Self::AfterFirstUnlockThisDeviceOnly,
        Self::AlwaysThisDeviceOnly,
    ];

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        ACCESSIBILITY_NAMES
            .iter()
            .find(|(_, level)| level == self)
            .map(|(name, _)| *name)
            .unwrap_or("default")
    }

    pub fn parse(s: &str) -> Result<Self> {
        ACCESSIBILITY_NAMES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, level)| *level)
            .ok_or_else(|| VaultError::InvalidName {
                what: "accessibility",
                value: s.to_owned(),
            })
    }

    /// `true` for levels that keep the item off other devices.
    pub fn is_device_local(&self) -> bool {
        matches!(
            self,
            Self::WhenPasscodeSetThisDeviceOnly
                | Self::WhenUnlockedThisDeviceOnly
                | Self::AfterFirstUnlockThisDeviceOnly
                | Self::AlwaysThisDeviceOnly
        )
    }
}

/// Items are released only while the device is unlocked unless the caller
/// asks otherwise.
impl Default for Accessibility {
    fn default() -> Self {
        Self::WhenUnlocked
    }
}

impl std::fmt::Display for Accessibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Accessibility {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Accessibility {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Accessibility> for String {
    fn from(level: Accessibility) -> Self {
        level.as_str().to_owned()
    }
}
