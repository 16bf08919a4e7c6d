//! Restricted execution (seccomp) profiles.
//!
//! Container runtimes block the keyring syscalls by default. The sender
//! takes a baseline profile, prepends one rule allowing `keyctl` and
//! `add_key` with any arguments, and hands the merged profile to the
//! launcher as a temporary file.
//!
//! Profiles are handled as untyped JSON so that fields this crate does not
//! know about pass through unchanged.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::{BridgeError, Result};

/// Upstream default profile maintained by the moby project.
pub const DEFAULT_PROFILE_URL: &str =
    "https://raw.githubusercontent.com/moby/profiles/refs/heads/main/seccomp/default.json";

/// Baseline shipped with the binary. Allows the usual container syscalls and
/// nothing keyring related.
pub const EMBEDDED_BASELINE: &str = include_str!("../profiles/baseline.json");

/// Syscalls the receiver needs to populate the session keyring.
pub const KEYRING_SYSCALLS: [&str; 2] = ["keyctl", "add_key"];

/// Action that lets a syscall through.
pub const SCMP_ACT_ALLOW: &str = "SCMP_ACT_ALLOW";

/// One entry of a profile's `syscalls` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyscallRule {
    pub names: Vec<String>,
    pub action: String,
    /// Argument filters. Absent means every argument value is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,
}

/// The rule prepended to every baseline.
pub fn keyring_rule() -> SyscallRule {
    SyscallRule {
        names: KEYRING_SYSCALLS.iter().map(|s| (*s).to_owned()).collect(),
        action: SCMP_ACT_ALLOW.to_owned(),
        args: None,
    }
}

/// Prepend [`keyring_rule`] to `baseline`'s `syscalls` array.
///
/// Every other field and every existing rule is kept as-is and in order. A
/// baseline without `syscalls` gets one.
///
/// # Errors
///
/// [`BridgeError::Profile`] if the baseline is not a JSON object or its
/// `syscalls` field is not an array.
pub fn merge_keyring_rule(mut baseline: Value) -> Result<Value> {
    let profile = baseline
        .as_object_mut()
        .ok_or_else(|| BridgeError::profile("baseline profile is not a JSON object"))?;

    let rule = serde_json::to_value(keyring_rule())?;
    match profile.get_mut("syscalls") {
        Some(Value::Array(rules)) => rules.insert(0, rule),
        Some(other) => {
            return Err(BridgeError::profile(format!(
                "baseline `syscalls` must be an array, found {}",
                json_type(other)
            )));
        }
        None => {
            profile.insert("syscalls".to_owned(), Value::Array(vec![rule]));
        }
    }
    Ok(baseline)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Baselines
// ---------------------------------------------------------------------------

/// Where the baseline profile comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProfileSource {
    /// [`EMBEDDED_BASELINE`].
    #[default]
    Embedded,
    /// Downloaded over HTTP(S).
    Url(String),
    /// Read from a local file.
    File(PathBuf),
}

impl std::fmt::Display for ProfileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Embedded => f.write_str("embedded"),
            Self::Url(url) => f.write_str(url),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Load a baseline profile.
pub async fn load_baseline(source: &ProfileSource) -> Result<Value> {
    let profile: Value = match source {
        ProfileSource::Embedded => serde_json::from_str(EMBEDDED_BASELINE)?,
        ProfileSource::Url(url) => {
            let client = reqwest::Client::builder()
                .user_agent(concat!("keybridge/", env!("CARGO_PKG_VERSION")))
                .timeout(Duration::from_secs(30))
                .build()?;
            client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?
        }
        ProfileSource::File(path) => serde_json::from_slice(&tokio::fs::read(path).await?)?,
    };
    tracing::debug!(source = %source, "loaded baseline profile");
    Ok(profile)
}

/// Load a baseline and merge the keyring rule into it.
pub async fn build_profile(source: &ProfileSource) -> Result<Value> {
    merge_keyring_rule(load_baseline(source).await?)
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Write `profile` as indented JSON followed by a newline.
pub fn write_profile<W: Write>(mut writer: W, profile: &Value) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, profile)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Write `profile` to a new temporary file. The file is deleted when the
/// returned handle is dropped.
pub fn write_temp_profile(profile: &Value) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("keybridge-seccomp-")
        .suffix(".json")
        .tempfile()?;
    write_profile(file.as_file_mut(), profile)?;
    tracing::debug!(path = %file.path().display(), "wrote temporary profile");
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keyring_rule_shape() {
        let value = serde_json::to_value(keyring_rule()).unwrap();
        assert_eq!(value, json!({"names": ["keyctl", "add_key"], "action": "SCMP_ACT_ALLOW"}));
    }

    #[test]
    fn merge_prepends_and_preserves_order() {
        let baseline = json!({
            "defaultAction": "SCMP_ACT_ERRNO",
            "syscalls": [
                {"names": ["read", "write"], "action": "SCMP_ACT_ALLOW"},
                {"names": ["clone"], "action": "SCMP_ACT_ALLOW", "args": [{"index": 0, "value": 1, "op": "SCMP_CMP_MASKED_EQ"}]},
            ]
        });
        let merged = merge_keyring_rule(baseline.clone()).unwrap();

        let rules = merged["syscalls"].as_array().unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0]["names"], json!(["keyctl", "add_key"]));
        assert_eq!(rules[0]["action"], "SCMP_ACT_ALLOW");
        assert_eq!(&rules[1..], baseline["syscalls"].as_array().unwrap().as_slice());
        assert_eq!(merged["defaultAction"], "SCMP_ACT_ERRNO");
    }

    #[test]
    fn merge_creates_missing_syscalls() {
        let merged = merge_keyring_rule(json!({"defaultAction": "SCMP_ACT_ERRNO"})).unwrap();
        assert_eq!(merged["syscalls"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn merge_rejects_bad_shapes() {
        assert!(matches!(
            merge_keyring_rule(json!({"syscalls": {"names": []}})),
            Err(BridgeError::Profile { .. })
        ));
        assert!(matches!(
            merge_keyring_rule(json!(["not", "an", "object"])),
            Err(BridgeError::Profile { .. })
        ));
    }

    #[test]
    fn embedded_baseline_has_no_keyring_rule() {
        let baseline: Value = serde_json::from_str(EMBEDDED_BASELINE).unwrap();
        let text = baseline["syscalls"].to_string();
        assert!(!text.contains("\"keyctl\""));
        assert!(!text.contains("\"add_key\""));
    }

    #[tokio::test]
    async fn build_from_embedded() {
        let profile = build_profile(&ProfileSource::Embedded).await.unwrap();
        assert_eq!(profile["syscalls"][0]["names"], json!(["keyctl", "add_key"]));
        assert_eq!(profile["defaultAction"], "SCMP_ACT_ERRNO");
    }

    #[tokio::test]
    async fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"syscalls":[]}"#).unwrap();
        let source = ProfileSource::File(file.path().to_owned());
        let profile = load_baseline(&source).await.unwrap();
        assert_eq!(profile, json!({"syscalls": []}));
    }

    #[test]
    fn temp_profile_roundtrip() {
        let profile = merge_keyring_rule(json!({"syscalls": []})).unwrap();
        let file = write_temp_profile(&profile).unwrap();
        let path = file.path().to_owned();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), profile);
        drop(file);
        assert!(!path.exists());
    }
}
