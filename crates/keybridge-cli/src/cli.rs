//! CLI argument definitions for Keybridge.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use keybridge_bridge::ProfileSource;
use keybridge_vault::{Accessibility, KeychainKind};

/// Keybridge -- move secrets from the host vault into containers.
#[derive(Parser)]
#[command(
    name = "keybridge",
    version,
    about = "Keybridge -- move secrets from the host vault into containers",
    long_about = "Stores secure notes in the OS credential vault, optionally through an \
                  entitled helper, and hands credential sets to containers through their \
                  standard input and the kernel session keyring."
)]
pub struct Cli {
    /// Configuration file. Falls back to $KEYBRIDGE_CONFIG.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read, write or delete secure notes.
    Keychain {
        #[command(subcommand)]
        action: KeychainAction,
    },

    /// Start a container with a credential set piped to its entrypoint.
    Run(RunArgs),

    /// Install credentials from stdin into the session keyring, then exec
    /// the command. Meant to be a container's first process.
    Entrypoint {
        /// Command to exec once the credentials are installed.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Write a seccomp profile that permits the keyring syscalls.
    CreateProfile {
        /// Output file. Defaults to stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[command(flatten)]
        profile: ProfileArgs,
    },
}

/// Actions on secure notes.
#[derive(Subcommand)]
pub enum KeychainAction {
    /// Print a secure note's payload to stdout.
    Read {
        /// Name of the note.
        name: String,

        #[command(flatten)]
        keychain: KeychainArgs,
    },
    /// Store a payload read from a file or stdin.
    Write {
        /// Name of the note.
        #[arg(long, short)]
        name: String,

        /// Payload file, or `-` for stdin.
        file: Option<PathBuf>,

        #[command(flatten)]
        keychain: KeychainArgs,
    },
    /// Delete a secure note.
    Delete {
        /// Name of the note.
        name: String,

        #[command(flatten)]
        keychain: KeychainArgs,
    },
}

/// Vault selection shared by every keychain action. Unset flags fall back
/// to the configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct KeychainArgs {
    /// Keychain kind: file, data-protection, icloud or all.
    #[arg(long)]
    pub keychain_type: Option<KeychainKind>,

    /// Account the notes belong to. Defaults to the current user.
    #[arg(long)]
    pub account: Option<String>,

    /// Accessibility level for new notes.
    #[arg(long)]
    pub accessibility: Option<Accessibility>,

    /// Overwrite an existing note instead of failing.
    #[arg(long)]
    pub update_in_place: bool,

    /// Keychain file for file-kind notes instead of the default search list.
    #[arg(long)]
    pub keychain_path: Option<PathBuf>,

    /// Use the platform vault in-process instead of the helper.
    #[arg(long)]
    pub direct: bool,

    /// Keychain helper binary.
    #[arg(long)]
    pub plugin: Option<PathBuf>,
}

/// Arguments for `keybridge run`.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Secure note holding the key list to send.
    #[arg(long)]
    pub keychain_item: Option<String>,

    /// File holding the key list to send (YAML or JSON).
    #[arg(long, conflicts_with = "keychain_item")]
    pub keys_file: Option<PathBuf>,

    /// Container launcher. Defaults to docker.
    #[arg(long)]
    pub launcher: Option<PathBuf>,

    #[command(flatten)]
    pub profile: ProfileArgs,

    #[command(flatten)]
    pub keychain: KeychainArgs,

    /// Arguments for the launcher, after `--`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Baseline profile selection.
#[derive(Args, Debug, Clone, Default)]
pub struct ProfileArgs {
    /// Download the baseline profile from this URL.
    #[arg(long, conflicts_with_all = ["profile_file", "embedded_profile"])]
    pub profile_url: Option<String>,

    /// Read the baseline profile from this file.
    #[arg(long, conflicts_with = "embedded_profile")]
    pub profile_file: Option<PathBuf>,

    /// Use the baseline profile built into the binary.
    #[arg(long)]
    pub embedded_profile: bool,
}

impl ProfileArgs {
    /// The selected source, or `fallback` when no flag was given.
    pub fn source_or(&self, fallback: ProfileSource) -> ProfileSource {
        if self.embedded_profile {
            ProfileSource::Embedded
        } else if let Some(url) = &self.profile_url {
            ProfileSource::Url(url.clone())
        } else if let Some(path) = &self.profile_file {
            ProfileSource::File(path.clone())
        } else {
            fallback
        }
    }
}
