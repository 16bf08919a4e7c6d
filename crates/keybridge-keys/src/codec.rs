//! Credential set transport codec.
//!
//! A set travels as one JSON envelope:
//!
//! ```text
//! {"format":"inmemory_key_store","payload":"<base64 of a JSON array of keys>"}
//! ```
//!
//! The format tag is checked before the payload is touched. An unknown tag is
//! always an error; there is no best-effort parse. The same encoding is used
//! for files, pipes and plugin response contents.

use std::io::{Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{KeysError, Result};
use crate::set::{CredentialSet, KeyInfo};

/// Format tag for an in-memory key store payload.
pub const FORMAT_IN_MEMORY_KEY_STORE: &str = "inmemory_key_store";

/// Message kinds a decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    InMemoryKeyStore,
}

impl MessageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InMemoryKeyStore => FORMAT_IN_MEMORY_KEY_STORE,
        }
    }

    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            FORMAT_IN_MEMORY_KEY_STORE => Ok(Self::InMemoryKeyStore),
            other => Err(KeysError::Format {
                found: other.to_owned(),
            }),
        }
    }
}

/// Outer transport envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub format: String,
    /// Base64 of the inner payload.
    pub payload: String,
}

/// Encode a set as a newline-terminated envelope.
pub fn encode(set: &CredentialSet) -> Result<Vec<u8>> {
    let inner = Zeroizing::new(serde_json::to_vec(set.as_slice())?);
    let envelope = Envelope {
        format: MessageFormat::InMemoryKeyStore.as_str().to_owned(),
        payload: STANDARD.encode(inner.as_slice()),
    };
    let mut out = serde_json::to_vec(&envelope)?;
    out.push(b'\n');
    Ok(out)
}

/// Decode an envelope.
///
/// # Errors
///
/// [`KeysError::Format`] for an unknown tag, [`KeysError::Parse`] for
/// anything that is not a well-formed envelope around a well-formed key list.
pub fn decode(data: &[u8]) -> Result<CredentialSet> {
    let envelope: Envelope = serde_json::from_slice(data).map_err(KeysError::parse)?;
    match MessageFormat::parse(&envelope.format)? {
        MessageFormat::InMemoryKeyStore => {
            let inner = STANDARD
                .decode(envelope.payload.as_bytes())
                .map(Zeroizing::new)
                .map_err(KeysError::parse)?;
            let keys: Vec<KeyInfo> = serde_json::from_slice(&inner).map_err(KeysError::parse)?;
            CredentialSet::from_keys(keys).map_err(|e| match e {
                KeysError::DuplicateKey { key_id } => {
                    KeysError::parse(format!("duplicate key id {key_id:?} in payload"))
                }
                other => other,
            })
        }
    }
}

/// Like [`decode`], but blank input (empty or whitespace only) means "no
/// credential set" rather than an error.
pub fn decode_optional(data: &[u8]) -> Result<Option<CredentialSet>> {
    if data.trim_ascii().is_empty() {
        return Ok(None);
    }
    decode(data).map(Some)
}

/// Read a whole stream and decode it with [`decode_optional`].
pub fn read_from<R: Read>(mut reader: R) -> Result<Option<CredentialSet>> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    decode_optional(&data)
}

/// Encode `set` into `writer`.
pub fn write_to<W: Write>(mut writer: W, set: &CredentialSet) -> Result<()> {
    writer.write_all(&encode(set)?)?;
    writer.flush()?;
    Ok(())
}
