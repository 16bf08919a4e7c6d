//! `keybridge keychain` and the key-list lookup used by `keybridge run`.
//!
//! Notes are reached either through the keychain helper, which carries the
//! vault entitlement, or directly through the platform vault when
//! `--direct` is given.

use anyhow::{Context, Result, bail};
use keybridge_keys::CredentialSet;
use keybridge_plugin::{PluginClient, PluginConfig};
use keybridge_vault::{SecureNoteStore, StoreOptions, VaultBackend, platform_backend_at};
use tokio::process::Command;

use crate::cli::{KeychainAction, KeychainArgs};
use crate::config::AppConfig;
use crate::helpers;

/// How secure notes are reached.
pub enum NoteAccess {
    Plugin(PluginClient),
    Direct(SecureNoteStore<Box<dyn VaultBackend>>),
}

/// Merge command-line flags over the configuration file.
pub fn resolve_plugin_config(args: &KeychainArgs, config: &AppConfig) -> PluginConfig {
    let mut plugin = config.plugin_config();
    if let Some(binary) = &args.plugin {
        plugin = plugin.with_binary(binary.clone());
    }
    if let Some(kind) = args.keychain_type {
        plugin = plugin.with_keychain_type(kind);
    }
    if let Some(account) = &args.account {
        plugin = plugin.with_account(account.clone());
    }
    if let Some(accessibility) = args.accessibility {
        plugin = plugin.with_accessibility(accessibility);
    }
    if args.update_in_place {
        plugin = plugin.with_update_in_place(true);
    }
    if let Some(path) = &args.keychain_path {
        plugin = plugin.with_keychain_path(path.clone());
    }
    plugin
}

impl NoteAccess {
    pub fn from_args(args: &KeychainArgs, config: &AppConfig) -> Result<Self> {
        let plugin = resolve_plugin_config(args, config);
        if args.direct {
            let path = plugin.keychain.keychain_path.as_deref();
            let backend = platform_backend_at(path).context("failed to open the keychain")?;
            Ok(Self::direct(backend, &plugin))
        } else {
            Ok(Self::Plugin(PluginClient::new(plugin)))
        }
    }

    /// In-process access through `backend` using the vault settings of
    /// `plugin`.
    pub fn direct(backend: Box<dyn VaultBackend>, plugin: &PluginConfig) -> Self {
        let keychain = &plugin.keychain;
        let options = StoreOptions::new()
            .with_update_in_place(keychain.update_in_place)
            .with_accessibility(keychain.accessibility);
        Self::Direct(SecureNoteStore::new(
            backend,
            keychain.keychain_type,
            keychain.account.clone(),
            options,
        ))
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        match self {
            Self::Plugin(client) => client
                .read(name)
                .await
                .with_context(|| format!("failed to read {name:?} through the keychain helper")),
            Self::Direct(store) => store
                .read(name)
                .with_context(|| format!("failed to read {name:?}")),
        }
    }

    pub async fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        match self {
            Self::Plugin(client) => client
                .write(name, data)
                .await
                .with_context(|| format!("failed to write {name:?} through the keychain helper")),
            Self::Direct(store) => store
                .write(name, data)
                .with_context(|| format!("failed to write {name:?}")),
        }
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        match self {
            Self::Plugin(client) => delete_via_helper(client.config(), name).await,
            Self::Direct(store) => store
                .delete(name)
                .with_context(|| format!("failed to delete {name:?}")),
        }
    }
}

/// Run `<helper> delete [--keychain-path <path>] <type> <account> <name>`.
async fn delete_via_helper(config: &PluginConfig, name: &str) -> Result<()> {
    let keychain = &config.keychain;
    let mut command = Command::new(&config.binary);
    command.arg("delete");
    if let Some(path) = &keychain.keychain_path {
        command.arg("--keychain-path").arg(path);
    }
    let status = command
        .arg(keychain.keychain_type.as_str())
        .arg(&keychain.account)
        .arg(name)
        .kill_on_drop(true)
        .status()
        .await
        .with_context(|| format!("failed to start {}", config.binary.display()))?;
    if !status.success() {
        bail!("keychain helper failed to delete {name:?} ({status})");
    }
    Ok(())
}

/// Load the key list stored in the secure note `item`.
pub async fn load_key_set(access: &NoteAccess, item: &str) -> Result<CredentialSet> {
    let data = access.read(item).await?;
    CredentialSet::from_key_list(&data)
        .with_context(|| format!("secure note {item:?} does not hold a key list"))
}

/// Dispatch a `keybridge keychain` action.
pub async fn run(action: KeychainAction, config: &AppConfig) -> Result<()> {
    match action {
        KeychainAction::Read { name, keychain } => {
            let data = NoteAccess::from_args(&keychain, config)?.read(&name).await?;
            helpers::write_stdout(&data)
        }
        KeychainAction::Write {
            name,
            file,
            keychain,
        } => {
            let data = helpers::read_input(file.as_deref())?;
            NoteAccess::from_args(&keychain, config)?
                .write(&name, &data)
                .await?;
            tracing::info!(name = %name, bytes = data.len(), "secure note stored");
            Ok(())
        }
        KeychainAction::Delete { name, keychain } => {
            NoteAccess::from_args(&keychain, config)?
                .delete(&name)
                .await?;
            tracing::info!(name = %name, "secure note deleted");
            Ok(())
        }
    }
}
