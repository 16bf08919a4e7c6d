//! Configuration file support.
//!
//! Settings are read from a TOML file named by `--config`, or by
//! `$KEYBRIDGE_CONFIG` when the flag is absent. With neither, built-in
//! defaults apply. Command-line flags always win over file values.
//!
//! ```toml
//! [plugin]
//! binary = "/usr/local/bin/keychain-plugin"
//! timeout_secs = 30
//! keychain_type = "data-protection"
//! account = "ci"
//! accessibility = "when-unlocked"
//! update_in_place = false
//! keychain_path = "/Users/ci/Library/Keychains/build.keychain-db"
//!
//! [container]
//! launcher = "docker"
//! extra_args = ["-t"]
//! profile_url = "https://example.com/seccomp.json"
//! keep_profile_until_exit = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use keybridge_bridge::{LaunchConfig, ProfileCleanup};
use keybridge_plugin::{DEFAULT_PLUGIN_BINARY, PluginConfig, current_user};
use keybridge_vault::{Accessibility, KeychainKind};
use serde::Deserialize;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "KEYBRIDGE_CONFIG";

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub plugin: PluginSection,
    pub container: ContainerSection,
}

/// `[plugin]`: the keychain helper and the vault settings it applies.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginSection {
    pub binary: PathBuf,
    pub timeout_secs: u64,
    pub keychain_type: KeychainKind,
    /// Empty means the current user.
    pub account: String,
    pub accessibility: Accessibility,
    pub update_in_place: bool,
    /// Keychain file for file-kind notes.
    pub keychain_path: Option<PathBuf>,
}

impl Default for PluginSection {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_PLUGIN_BINARY),
            timeout_secs: 30,
            keychain_type: KeychainKind::DataProtection,
            account: String::new(),
            accessibility: Accessibility::default(),
            update_in_place: false,
            keychain_path: None,
        }
    }
}

/// `[container]`: how containers are launched.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerSection {
    pub launcher: PathBuf,
    pub extra_args: Vec<String>,
    /// Baseline profile to download instead of the embedded one.
    pub profile_url: Option<String>,
    pub keep_profile_until_exit: bool,
}

impl Default for ContainerSection {
    fn default() -> Self {
        let launch = LaunchConfig::default();
        Self {
            launcher: launch.launcher,
            extra_args: launch.extra_args,
            profile_url: None,
            keep_profile_until_exit: false,
        }
    }
}

impl AppConfig {
    /// Load from `explicit`, else `$KEYBRIDGE_CONFIG`, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_owned()),
            None => std::env::var_os(CONFIG_ENV).map(PathBuf::from),
        };
        match path {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Client settings for the keychain helper.
    pub fn plugin_config(&self) -> PluginConfig {
        let section = &self.plugin;
        let account = if section.account.is_empty() {
            current_user()
        } else {
            section.account.clone()
        };
        let plugin = PluginConfig::new()
            .with_binary(section.binary.clone())
            .with_timeout(Duration::from_secs(section.timeout_secs))
            .with_keychain_type(section.keychain_type)
            .with_account(account)
            .with_accessibility(section.accessibility)
            .with_update_in_place(section.update_in_place);
        match &section.keychain_path {
            Some(path) => plugin.with_keychain_path(path.clone()),
            None => plugin,
        }
    }

    /// Container launcher settings.
    pub fn launch_config(&self) -> LaunchConfig {
        let section = &self.container;
        LaunchConfig::new()
            .with_launcher(section.launcher.clone())
            .with_extra_args(section.extra_args.clone())
            .with_profile_cleanup(if section.keep_profile_until_exit {
                ProfileCleanup::AfterExit
            } else {
                ProfileCleanup::AfterSpawn
            })
    }
}
