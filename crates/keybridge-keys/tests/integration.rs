//! Integration tests for the keybridge-keys crate.

use keybridge_keys::{CredentialSet, KeyInfo, KeysError, codec};

#[test]
fn key_list_to_transport_and_back() {
    // A keychain item holds a plain key list; the sender re-encodes it.
    let item = br#"[
        {"key_id": "test-key", "token": "test-value-secret", "user": "test-user"},
        {"key_id": "deploy", "token": "d3pl0y", "owner": "ci"}
    ]"#;
    let set = CredentialSet::from_key_list(item).unwrap();

    let mut pipe = Vec::new();
    codec::write_to(&mut pipe, &set).unwrap();

    let received = codec::read_from(pipe.as_slice()).unwrap().unwrap();
    assert_eq!(received.ids(), vec!["test-key", "deploy"]);
    for (sent, got) in set.iter().zip(received.iter()) {
        assert_eq!(sent.key_id, got.key_id);
        assert_eq!(sent.owner, got.owner);
        assert_eq!(sent.token, got.token);
    }
}

#[test]
fn metadata_survives_transport() {
    let set = CredentialSet::from_keys([
        KeyInfo::new("k", "o", "t").with_metadata(serde_json::json!({"expires": "2026-12-31"})),
    ])
    .unwrap();
    let decoded = codec::decode(&codec::encode(&set).unwrap()).unwrap();
    assert_eq!(decoded, set);
}

#[test]
fn any_other_tag_is_rejected_even_with_valid_payload() {
    let set = CredentialSet::from_keys([KeyInfo::new("k", "o", "t")]).unwrap();
    let encoded = codec::encode(&set).unwrap();
    let text = String::from_utf8(encoded).unwrap();

    for tag in ["", "INMEMORY_KEY_STORE", "inmemory_key_store ", "keyring"] {
        let altered = text.replacen("inmemory_key_store", tag, 1);
        assert!(
            matches!(codec::decode(altered.as_bytes()), Err(KeysError::Format { .. })),
            "tag {tag:?} should be rejected"
        );
    }
}

#[test]
fn truncated_envelope_is_parse_error() {
    let set = CredentialSet::from_keys([KeyInfo::new("k", "o", "t")]).unwrap();
    let encoded = codec::encode(&set).unwrap();
    let truncated = &encoded[..encoded.len() / 2];
    assert!(matches!(
        codec::decode(truncated),
        Err(KeysError::Parse { .. })
    ));
}
