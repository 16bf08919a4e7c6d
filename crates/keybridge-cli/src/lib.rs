//! Command-line front end for Keybridge.
//!
//! Two binaries share this library:
//!
//! - `keybridge` -- secure note management, container launch, the
//!   container entrypoint, and profile generation.
//! - `keychain-plugin` -- the entitled helper that serves one plugin
//!   request per invocation.

pub mod cli;
pub mod config;
pub mod container;
pub mod helpers;
pub mod keychain;
