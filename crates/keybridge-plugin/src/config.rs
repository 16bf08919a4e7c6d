//! Plugin client configuration.
//!
//! [`PluginConfig`] names the helper binary, bounds how long one invocation
//! may take, and carries the vault settings forwarded to the helper with
//! every request. Defaults are provided via [`Default`] and individual
//! fields can be customised with the `with_*` builders.

use std::path::PathBuf;
use std::time::Duration;

use keybridge_vault::{Accessibility, KeychainKind};

use crate::protocol::{KeychainConfig, SysSpecific};

/// Default helper binary, resolved through `PATH`.
pub const DEFAULT_PLUGIN_BINARY: &str = "keychain-plugin";

/// Settings for [`crate::PluginClient`].
#[derive(Debug, Clone)]
pub struct PluginConfig {
    /// Helper executable.
    ///
    /// Default: **keychain-plugin**.
    pub binary: PathBuf,

    /// Wall-clock limit for one invocation. The helper is killed when it
    /// expires.
    ///
    /// Default: **30 s**.
    pub timeout: Duration,

    /// Vault settings sent with every request.
    ///
    /// Default: data-protection keychain, account `$USER`.
    pub keychain: KeychainConfig,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_PLUGIN_BINARY),
            timeout: Duration::from_secs(30),
            keychain: KeychainConfig::new(KeychainKind::DataProtection, current_user()),
        }
    }
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_keychain_type(mut self, kind: KeychainKind) -> Self {
        self.keychain.keychain_type = kind;
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.keychain.account = account.into();
        self
    }

    pub fn with_update_in_place(mut self, update_in_place: bool) -> Self {
        self.keychain.update_in_place = update_in_place;
        self
    }

    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.keychain.accessibility = accessibility;
        self
    }

    /// Keep file-kind notes in the keychain file at `path`.
    pub fn with_keychain_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.keychain.keychain_path = Some(path.into());
        self
    }

    pub(crate) fn sys_specific(&self) -> SysSpecific {
        SysSpecific::MacosKeychain(self.keychain.clone())
    }
}

/// Login name of the current user, or an empty string if unknown.
pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_default()
}
