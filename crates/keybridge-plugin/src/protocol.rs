//! Wire types exchanged with the keychain helper.
//!
//! One invocation carries exactly one [`Request`] on the helper's standard
//! input and one [`Response`] on its standard output. Binary fields travel
//! as standard base64 strings:
//!
//! ```text
//! -> {"id":7,"keyname":"ci-keys","write":false,"sys_specific":"eyJraW5kIjoi..."}
//! <- {"id":7,"contents":"W3sia2V5X2lkIjoi..."}
//! <- {"id":7,"error":{"message":"key not found","detail":"ci-keys"}}
//! ```
//!
//! `sys_specific` is the base64 of a JSON [`SysSpecific`] document that tells
//! the helper which vault configuration to use. It is decoded into a closed
//! enum; unknown kinds or unknown fields are rejected rather than ignored.

use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use keybridge_vault::{Accessibility, KeychainKind};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{PluginError, Result};

/// Error message for a missing key. The detail carries the key name.
pub const MSG_KEY_NOT_FOUND: &str = "key not found";

/// Error message for a duplicate create. The detail carries the key name.
pub const MSG_KEY_EXISTS: &str = "key already exists";

// ---------------------------------------------------------------------------
// Vault configuration
// ---------------------------------------------------------------------------

/// Secure note store settings the helper should apply to one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeychainConfig {
    pub keychain_type: KeychainKind,
    pub account: String,
    #[serde(default)]
    pub update_in_place: bool,
    #[serde(default)]
    pub accessibility: Accessibility,
    /// Keychain file for file-kind notes. Unset means the default search
    /// list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keychain_path: Option<PathBuf>,
}

impl KeychainConfig {
    pub fn new(keychain_type: KeychainKind, account: impl Into<String>) -> Self {
        Self {
            keychain_type,
            account: account.into(),
            update_in_place: false,
            accessibility: Accessibility::default(),
            keychain_path: None,
        }
    }

    pub fn with_update_in_place(mut self, update_in_place: bool) -> Self {
        self.update_in_place = update_in_place;
        self
    }

    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    pub fn with_keychain_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.keychain_path = Some(path.into());
        self
    }
}

/// Backend-specific request settings, tagged by backend kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "config", rename_all = "snake_case")]
pub enum SysSpecific {
    MacosKeychain(KeychainConfig),
}

impl SysSpecific {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A single helper request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, echoed by the response.
    pub id: u64,
    pub keyname: String,
    #[serde(default)]
    pub write: bool,
    /// Payload of a write. Wiped when the request is dropped.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "b64::secret")]
    pub contents: Option<Zeroizing<Vec<u8>>>,
    /// Base64 of the JSON [`SysSpecific`] document. Kept encoded so that a
    /// malformed value still leaves the id readable.
    #[serde(default)]
    pub sys_specific: String,
}

impl Request {
    /// Build a read request.
    pub fn read(id: u64, keyname: impl Into<String>, sys: &SysSpecific) -> Result<Self> {
        Ok(Self {
            id,
            keyname: keyname.into(),
            write: false,
            contents: None,
            sys_specific: STANDARD.encode(sys.encode()?),
        })
    }

    /// Build a write request carrying `contents`.
    pub fn write(
        id: u64,
        keyname: impl Into<String>,
        contents: Vec<u8>,
        sys: &SysSpecific,
    ) -> Result<Self> {
        Ok(Self {
            id,
            keyname: keyname.into(),
            write: true,
            contents: Some(Zeroizing::new(contents)),
            sys_specific: STANDARD.encode(sys.encode()?),
        })
    }

    /// Decode the embedded backend settings.
    pub fn sys_specific(&self) -> Result<SysSpecific> {
        let raw = STANDARD.decode(&self.sys_specific)?;
        SysSpecific::decode(&raw)
    }

    /// Build the response to this request. The id is always echoed.
    pub fn response(&self, contents: Option<Vec<u8>>, error: Option<ErrorBody>) -> Response {
        Response {
            id: self.id,
            contents,
            error,
            sys_specific: None,
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("keyname", &self.keyname)
            .field("write", &self.write)
            .field("contents", &self.contents.as_ref().map(|c| c.len()))
            .finish_non_exhaustive()
    }
}

/// Error carried by a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default)]
    pub detail: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: detail.into(),
        }
    }

    pub fn key_not_found(keyname: &str) -> Self {
        Self::new(MSG_KEY_NOT_FOUND, keyname)
    }

    pub fn key_exists(keyname: &str) -> Self {
        Self::new(MSG_KEY_EXISTS, keyname)
    }
}

/// A single helper response.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "b64::option")]
    pub contents: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    /// Stripped by the helper before sending.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "b64::option")]
    pub sys_specific: Option<Vec<u8>>,
}

impl Response {
    /// Error response without contents.
    pub fn rejected(id: u64, error: ErrorBody) -> Self {
        Self {
            id,
            contents: None,
            error: Some(error),
            sys_specific: None,
        }
    }

    /// Turn the wire outcome into a typed result for `keyname`.
    ///
    /// `stderr` is attached to generic plugin errors.
    pub fn into_result(self, keyname: &str, stderr: &str) -> Result<Option<Vec<u8>>> {
        match self.error {
            None => Ok(self.contents),
            Some(e) if e.message == MSG_KEY_NOT_FOUND => Err(PluginError::KeyNotFound {
                key: keyname.to_owned(),
            }),
            Some(e) if e.message == MSG_KEY_EXISTS => Err(PluginError::KeyExists {
                key: keyname.to_owned(),
            }),
            Some(e) => Err(PluginError::Plugin {
                message: e.message,
                detail: e.detail,
                stderr: stderr.to_owned(),
            }),
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("id", &self.id)
            .field("contents", &self.contents.as_ref().map(|c| c.len()))
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Base64 field codecs
// ---------------------------------------------------------------------------

mod b64 {
    pub mod secret {
        use base64::Engine;
        use base64::engine::general_purpose::STANDARD;
        use serde::{Deserialize, Deserializer, Serializer};
        use zeroize::Zeroizing;

        pub fn serialize<S: Serializer>(
            data: &Option<Zeroizing<Vec<u8>>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match data {
                Some(bytes) => s.serialize_str(&Zeroizing::new(STANDARD.encode(bytes.as_slice()))),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<Zeroizing<Vec<u8>>>, D::Error> {
            match Option::<String>::deserialize(d)?.map(Zeroizing::new) {
                Some(text) => STANDARD
                    .decode(text.as_bytes())
                    .map(|bytes| Some(Zeroizing::new(bytes)))
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }

    pub mod option {
        use base64::Engine;
        use base64::engine::general_purpose::STANDARD;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            data: &Option<Vec<u8>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match data {
                Some(bytes) => s.serialize_str(&STANDARD.encode(bytes)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(text) => STANDARD
                    .decode(text)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sys() -> SysSpecific {
        SysSpecific::MacosKeychain(KeychainConfig::new(KeychainKind::DataProtection, "alice"))
    }

    #[test]
    fn request_wire_shape() {
        let req = Request::write(7, "svc", b"hello".to_vec(), &sys()).unwrap();
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["keyname"], "svc");
        assert_eq!(value["write"], true);
        assert_eq!(value["contents"], "aGVsbG8=");
        assert!(value["sys_specific"].is_string());

        let back: Request = serde_json::from_value(value).unwrap();
        assert_eq!(back.contents, Some(Zeroizing::new(b"hello".to_vec())));
    }

    #[test]
    fn read_request_omits_contents() {
        let req = Request::read(1, "svc", &sys()).unwrap();
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("contents").is_none());
    }

    #[test]
    fn sys_specific_is_tagged() {
        let value: serde_json::Value = serde_json::from_slice(&sys().encode().unwrap()).unwrap();
        assert_eq!(value["kind"], "macos_keychain");
        assert_eq!(value["config"]["keychain_type"], "data-protection");
        assert_eq!(value["config"]["account"], "alice");
        assert_eq!(value["config"]["accessibility"], "when-unlocked");
    }

    #[test]
    fn sys_specific_rejects_unknown_kind_and_fields() {
        let unknown_kind = br#"{"kind":"windows_vault","config":{}}"#;
        assert!(SysSpecific::decode(unknown_kind).is_err());

        let extra_field = concat!(
            r#"{"kind":"macos_keychain","#,
            r#""config":{"keychain_type":"file","account":"a","colour":"red"}}"#,
        );
        assert!(SysSpecific::decode(extra_field.as_bytes()).is_err());
    }

    #[test]
    fn sys_specific_defaults_optional_fields() {
        let doc = br#"{"kind":"macos_keychain","config":{"keychain_type":"local","account":"a"}}"#;
        let SysSpecific::MacosKeychain(cfg) = SysSpecific::decode(doc).unwrap();
        assert_eq!(cfg.keychain_type, KeychainKind::DataProtection);
        assert!(!cfg.update_in_place);
        assert_eq!(cfg.accessibility, Accessibility::WhenUnlocked);
        assert_eq!(cfg.keychain_path, None);
    }

    #[test]
    fn keychain_path_is_carried() {
        let config = KeychainConfig::new(KeychainKind::File, "ci")
            .with_keychain_path("/Users/ci/Library/Keychains/build.keychain-db");
        let req = Request::read(1, "svc", &SysSpecific::MacosKeychain(config.clone())).unwrap();
        assert_eq!(req.sys_specific().unwrap(), SysSpecific::MacosKeychain(config));

        let plain = sys().encode().unwrap();
        assert!(!String::from_utf8(plain).unwrap().contains("keychain_path"));
    }

    #[test]
    fn sys_specific_stays_encoded_until_asked() {
        let req: Request = serde_json::from_str(
            r#"{"id":77,"keyname":"k","write":false,"sys_specific":"!!!not-base64!!!"}"#,
        )
        .unwrap();
        assert_eq!(req.id, 77);
        assert!(matches!(req.sys_specific(), Err(PluginError::Base64(_))));
    }

    #[test]
    fn response_echoes_id() {
        let req = Request::read(42, "svc", &sys()).unwrap();
        let resp = req.response(Some(b"x".to_vec()), None);
        assert_eq!(resp.id, 42);
        assert!(resp.sys_specific.is_none());
    }

    #[test]
    fn response_maps_well_known_errors() {
        let resp = Response::rejected(1, ErrorBody::key_not_found("svc"));
        assert!(resp.into_result("svc", "").unwrap_err().is_not_found());

        let resp = Response::rejected(1, ErrorBody::key_exists("svc"));
        assert!(resp.into_result("svc", "").unwrap_err().is_already_exists());

        let resp = Response::rejected(1, ErrorBody::new("boom", "bad"));
        match resp.into_result("svc", "trace").unwrap_err() {
            PluginError::Plugin {
                message,
                detail,
                stderr,
            } => {
                assert_eq!(message, "boom");
                assert_eq!(detail, "bad");
                assert_eq!(stderr, "trace");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn response_decodes_base64_contents() {
        let resp: Response = serde_json::from_str(r#"{"id":3,"contents":"aGVsbG8="}"#).unwrap();
        assert_eq!(resp.into_result("svc", "").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn debug_hides_contents() {
        let req = Request::write(1, "svc", b"top-secret".to_vec(), &sys()).unwrap();
        assert!(!format!("{req:?}").contains("top-secret"));
    }
}
