//! Credential entries and insertion-ordered credential sets.
//!
//! A [`CredentialSet`] is built fresh for each distribution event and dropped
//! once its keys are installed. Tokens are wiped from memory on drop.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{KeysError, Result};

/// Secret token value. Zeroed on drop and redacted in debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token([redacted])")
    }
}

/// One named secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyInfo {
    /// Unique id within a set. Also the name the secret is installed under.
    pub key_id: String,

    /// Who the key belongs to. Key lists written by older tools call this
    /// field `user`.
    #[serde(default, alias = "user")]
    pub owner: String,

    pub token: Token,

    /// Free-form extra data carried alongside the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl KeyInfo {
    pub fn new(
        key_id: impl Into<String>,
        owner: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            owner: owner.into(),
            token: Token::new(token),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Named collection of secrets, kept in insertion order.
///
/// Lookup by id is O(n), which is fine for the handful of keys a container
/// needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialSet {
    keys: Vec<KeyInfo>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from keys in order, rejecting duplicate ids.
    pub fn from_keys(keys: impl IntoIterator<Item = KeyInfo>) -> Result<Self> {
        let mut set = Self::new();
        for key in keys {
            set.add(key)?;
        }
        Ok(set)
    }

    /// Parse a key list as stored in a keychain item: a YAML or JSON sequence
    /// of `{key_id, token, owner|user}` mappings.
    pub fn from_key_list(data: &[u8]) -> Result<Self> {
        let keys: Vec<KeyInfo> = serde_yaml::from_slice(data).map_err(KeysError::parse)?;
        let set = Self::from_keys(keys)?;
        tracing::debug!(keys = set.len(), "parsed key list");
        Ok(set)
    }

    /// Append a key. A key whose id is already present is rejected rather
    /// than silently overwriting the earlier one.
    pub fn add(&mut self, key: KeyInfo) -> Result<()> {
        if self.contains(&key.key_id) {
            return Err(KeysError::DuplicateKey { key_id: key.key_id });
        }
        self.keys.push(key);
        Ok(())
    }

    pub fn get(&self, key_id: &str) -> Option<&KeyInfo> {
        self.keys.iter().find(|k| k.key_id == key_id)
    }

    pub fn contains(&self, key_id: &str) -> bool {
        self.get(key_id).is_some()
    }

    /// Remove a key by id.
    pub fn remove(&mut self, key_id: &str) -> Result<KeyInfo> {
        let idx = self
            .keys
            .iter()
            .position(|k| k.key_id == key_id)
            .ok_or_else(|| KeysError::KeyNotFound {
                key_id: key_id.to_owned(),
            })?;
        Ok(self.keys.remove(idx))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyInfo> {
        self.keys.iter()
    }

    /// Key ids in insertion order.
    pub fn ids(&self) -> Vec<&str> {
        self.keys.iter().map(|k| k.key_id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub(crate) fn as_slice(&self) -> &[KeyInfo] {
        &self.keys
    }
}

impl<'a> IntoIterator for &'a CredentialSet {
    type Item = &'a KeyInfo;
    type IntoIter = std::slice::Iter<'a, KeyInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
