//! Credential sets for Keybridge.
//!
//! - **[`set`]** -- [`KeyInfo`] and the insertion-ordered [`CredentialSet`].
//! - **[`codec`]** -- the tagged envelope used to move a set through a file,
//!   a pipe, or a plugin response.
//! - **[`error`]** -- [`KeysError`].

pub mod codec;
pub mod error;
pub mod set;

pub use codec::{FORMAT_IN_MEMORY_KEY_STORE, decode, decode_optional, encode};
pub use error::{KeysError, Result};
pub use set::{CredentialSet, KeyInfo, Token};
