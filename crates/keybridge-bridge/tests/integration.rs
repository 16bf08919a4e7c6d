//! Integration tests for the keybridge-bridge crate.

use keybridge_bridge::{
    BridgeError, ContainerLauncher, Entrypoint, LaunchConfig, MemoryKeyring, ProfileCleanup,
    ProfileSource, build_profile, merge_keyring_rule,
};
use keybridge_keys::{CredentialSet, KeyInfo, codec};
use serde_json::json;

// ═══════════════════════════════════════════════════════════════════════
//  Receiver
// ═══════════════════════════════════════════════════════════════════════

fn test_set() -> CredentialSet {
    CredentialSet::from_keys([KeyInfo::new("test-key", "test-user", "test-value-secret")]).unwrap()
}

#[test]
fn encoded_set_is_installed_before_handoff() {
    let stdin = codec::encode(&test_set()).unwrap();
    let entry = Entrypoint::new(MemoryKeyring::new());

    let handoff = entry
        .prepare(stdin.as_slice(), vec!["/usr/bin/env".into()])
        .unwrap();

    assert_eq!(
        entry.keyring().get("test-key").as_deref(),
        Some(&b"test-value-secret"[..])
    );
    assert_eq!(handoff.program, "/usr/bin/env");
}

#[cfg(target_os = "linux")]
#[test]
#[ignore = "requires keyctl/add_key to be permitted (blocked by default container seccomp profiles)"]
fn encoded_set_lands_in_session_keyring() {
    use keybridge_bridge::{SessionKeyring, read_session_key};

    let stdin = codec::encode(&test_set()).unwrap();
    let entry = Entrypoint::new(SessionKeyring::open().unwrap());
    entry.prepare(stdin.as_slice(), vec!["true".into()]).unwrap();

    assert_eq!(read_session_key("test-key").unwrap(), b"test-value-secret");
}

// ═══════════════════════════════════════════════════════════════════════
//  Profile
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn merged_profile_leads_with_keyring_rule() {
    let baseline = json!({
        "defaultAction": "SCMP_ACT_ERRNO",
        "syscalls": [
            {"names": ["accept", "bind"], "action": "SCMP_ACT_ALLOW"},
            {"names": ["ptrace"], "action": "SCMP_ACT_ALLOW", "includes": {"minKernel": "4.8"}},
            {"names": ["clone3"], "action": "SCMP_ACT_ERRNO", "errnoRet": 38}
        ]
    });
    let original = baseline["syscalls"].as_array().unwrap().clone();

    let merged = merge_keyring_rule(baseline).unwrap();
    let rules = merged["syscalls"].as_array().unwrap();

    assert_eq!(rules[0]["names"], json!(["keyctl", "add_key"]));
    assert_eq!(rules[0]["action"], "SCMP_ACT_ALLOW");
    assert!(rules[0].get("args").is_none());
    assert_eq!(&rules[1..], original.as_slice());
}

#[tokio::test]
async fn embedded_profile_is_ready_to_use() {
    let profile = build_profile(&ProfileSource::Embedded).await.unwrap();
    let rules = profile["syscalls"].as_array().unwrap();
    assert_eq!(rules[0]["names"], json!(["keyctl", "add_key"]));
    assert!(rules.len() > 1);
}

// ═══════════════════════════════════════════════════════════════════════
//  Sender against a fake launcher
// ═══════════════════════════════════════════════════════════════════════

#[cfg(unix)]
fn fake_launcher(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("docker");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    file.write_all(body.as_bytes()).unwrap();
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[tokio::test]
async fn launcher_receives_args_profile_and_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let args_out = dir.path().join("args");
    let stdin_out = dir.path().join("stdin");
    let profile_out = dir.path().join("profile");
    // Record the arguments, copy the profile while it still exists, and
    // capture standard input.
    let body = format!(
        r#"printf '%s\n' "$@" > '{args}'
for a in "$@"; do
  case "$a" in seccomp=*) cp "${{a#seccomp=}}" '{profile}' ;; esac
done
cat > '{stdin}'
"#,
        args = args_out.display(),
        profile = profile_out.display(),
        stdin = stdin_out.display(),
    );
    let launcher = ContainerLauncher::new(
        LaunchConfig::new()
            .with_launcher(fake_launcher(&dir, &body))
            .with_profile_cleanup(ProfileCleanup::AfterExit),
    );

    let profile = merge_keyring_rule(json!({"syscalls": []})).unwrap();
    let user_args: Vec<String> = ["run", "--rm", "-i", "alpine", "keyctl", "show"]
        .iter()
        .map(|s| (*s).to_owned())
        .collect();
    let status = launcher.run(&test_set(), &profile, &user_args).await.unwrap();
    assert!(status.success());

    let args = std::fs::read_to_string(&args_out).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(&args[..3], &["run", "-i", "--security-opt"]);
    assert!(args[3].starts_with("seccomp="));
    assert_eq!(&args[4..], &["--rm", "alpine", "keyctl", "show"]);

    // The temporary profile is gone once the launcher has exited.
    let profile_path = args[3].trim_start_matches("seccomp=");
    assert!(!std::path::Path::new(profile_path).exists());
    let copied: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&profile_out).unwrap()).unwrap();
    assert_eq!(copied, profile);

    let received = codec::decode(&std::fs::read(&stdin_out).unwrap()).unwrap();
    assert_eq!(received, test_set());
}

#[cfg(unix)]
#[tokio::test]
async fn failing_launcher_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = ContainerLauncher::new(
        LaunchConfig::new().with_launcher(fake_launcher(&dir, "cat > /dev/null\nexit 125\n")),
    );
    let profile = merge_keyring_rule(json!({})).unwrap();
    let err = launcher
        .run(&CredentialSet::new(), &profile, &["alpine".to_owned()])
        .await
        .unwrap_err();
    match err {
        BridgeError::LauncherFailed { status, command } => {
            assert_eq!(status.code(), Some(125));
            assert!(command.contains("--security-opt"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
