//! Plugin protocol for Keybridge.
//!
//! A caller without the vault-access entitlement delegates secure note reads
//! and writes to a separately signed helper. The two sides exchange exactly
//! one JSON request and one JSON response over the helper's standard
//! input/output, then the helper exits.
//!
//! # Modules
//!
//! - [`protocol`] -- wire messages, the tagged `sys_specific` settings, and well-known errors.
//! - [`config`] -- [`PluginConfig`] for the client.
//! - [`client`] -- [`PluginClient`], which spawns the helper per call.
//! - [`server`] -- [`PluginServer`], the helper side.
//! - [`error`] -- Unified error types.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::PluginClient;
pub use config::{DEFAULT_PLUGIN_BINARY, PluginConfig, current_user};
pub use error::{PluginError, Result};
pub use protocol::{
    ErrorBody, KeychainConfig, MSG_KEY_EXISTS, MSG_KEY_NOT_FOUND, Request, Response, SysSpecific,
};
pub use server::PluginServer;
