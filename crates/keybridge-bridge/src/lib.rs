//! Container secret bridge for Keybridge.
//!
//! Moves a credential set from the host into a container without touching
//! the container's filesystem or environment. The sender pipes the encoded
//! set into the container launcher's standard input; the container's
//! entrypoint decodes it, installs each token in the kernel session keyring,
//! and execs the real command.
//!
//! # Modules
//!
//! - [`profile`] -- seccomp profile loading and keyring rule merging.
//! - [`sender`] -- [`ContainerLauncher`], the host side.
//! - [`entrypoint`] -- [`Entrypoint`], the container side.
//! - [`keyring`] -- session keyring access plus an in-memory stand-in.
//! - [`error`] -- Unified error types.

pub mod entrypoint;
pub mod error;
pub mod keyring;
pub mod profile;
pub mod sender;

pub use entrypoint::{Entrypoint, Handoff, ProcessExec, SystemExec};
pub use error::{BridgeError, Result};
pub use keyring::{KeyId, Keyring, MemoryKeyring, SessionKeyring, read_session_key};
pub use profile::{
    DEFAULT_PROFILE_URL, ProfileSource, SyscallRule, build_profile, keyring_rule,
    load_baseline, merge_keyring_rule, write_profile, write_temp_profile,
};
pub use sender::{ContainerLauncher, LaunchConfig, ProfileCleanup, launch_args};
