//! Keychain helper for Keybridge.
//!
//! Invoked without arguments, reads one plugin request from stdin, runs it
//! against the platform vault, and writes one response to stdout. The
//! `delete` verb removes a note directly and is meant for administrators.
//!
//! The operational log is JSON on stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keybridge_cli::helpers::init_json_tracing;
use keybridge_plugin::{KeychainConfig, PluginServer};
use keybridge_vault::{KeychainKind, SecureNoteStore, StoreOptions, platform_backend_at};

/// Entitled helper serving Keybridge secure note requests.
#[derive(Parser)]
#[command(name = "keychain-plugin", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Delete a secure note.
    Delete {
        /// Keychain file holding file-kind notes.
        #[arg(long)]
        keychain_path: Option<PathBuf>,
        keychain_type: KeychainKind,
        account: String,
        service: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_json_tracing("info");

    match cli.command {
        None => {
            let server = PluginServer::new(|config: &KeychainConfig| {
                platform_backend_at(config.keychain_path.as_deref())
            });
            server
                .serve(std::io::stdin().lock(), std::io::stdout().lock())
                .context("failed to send plugin response")
        }
        Some(Command::Delete {
            keychain_path,
            keychain_type,
            account,
            service,
        }) => {
            let backend = platform_backend_at(keychain_path.as_deref())
                .context("failed to open the keychain")?;
            let store = SecureNoteStore::new(
                backend,
                keychain_type,
                account,
                StoreOptions::new(),
            );
            store
                .delete(&service)
                .with_context(|| format!("failed to delete {service:?}"))
        }
    }
}
