//! Container entrypoint (receiver side).
//!
//! Runs as a container's first process: decode the credential set piped to
//! standard input, install every key into the keyring, then replace the
//! process image with the target command. All keys are installed before the
//! exec, and the first failed install aborts the whole run so the target
//! never starts without its secrets.
//!
//! Process replacement sits behind [`ProcessExec`] so tests can observe the
//! command that would run.

use std::io::Read;

use keybridge_keys::{CredentialSet, codec};

use crate::error::{BridgeError, Result};
use crate::keyring::Keyring;

/// Decodes and installs credentials before handing off to the target.
pub struct Entrypoint<K> {
    keyring: K,
}

impl<K: Keyring> Entrypoint<K> {
    pub fn new(keyring: K) -> Self {
        Self { keyring }
    }

    pub fn keyring(&self) -> &K {
        &self.keyring
    }

    /// Read `stdin` to its end, install any keys found, and return the
    /// command to exec.
    ///
    /// Blank input means no credentials and is not an error.
    pub fn prepare<R: Read>(&self, stdin: R, args: Vec<String>) -> Result<Handoff> {
        let handoff = Handoff::from_args(args)?;
        match codec::read_from(stdin)? {
            Some(set) => {
                let installed = self.install(&set)?;
                tracing::info!(keys = installed, "credentials installed");
            }
            None => tracing::info!("no credentials on stdin"),
        }
        Ok(handoff)
    }

    /// Install every key of `set` in order. Stops at the first failure.
    pub fn install(&self, set: &CredentialSet) -> Result<usize> {
        for key in set {
            let id = self
                .keyring
                .add(&key.key_id, key.token.as_bytes())
                .map_err(|source| BridgeError::InstallFailure {
                    key_id: key.key_id.clone(),
                    source,
                })?;
            tracing::info!(key_id = %key.key_id, serial = %id, "key written");
        }
        Ok(set.len())
    }
}

// ---------------------------------------------------------------------------
// Hand-off
// ---------------------------------------------------------------------------

/// Replaces the current process image.
pub trait ProcessExec {
    /// Replace the current process with `program`. Returns only on failure.
    fn exec(&self, program: &str, args: &[String]) -> std::io::Error;
}

/// [`ProcessExec`] backed by `execvp(3)`. Inherits the environment and the
/// session keyring.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExec;

impl ProcessExec for SystemExec {
    #[cfg(unix)]
    fn exec(&self, program: &str, args: &[String]) -> std::io::Error {
        use std::os::unix::process::CommandExt;
        std::process::Command::new(program).args(args).exec()
    }

    #[cfg(not(unix))]
    fn exec(&self, _program: &str, _args: &[String]) -> std::io::Error {
        std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "process replacement requires a unix platform",
        )
    }
}

/// The command the entrypoint becomes once credentials are installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    pub program: String,
    pub args: Vec<String>,
}

impl Handoff {
    /// Split `argv` into program and arguments.
    pub fn from_args(argv: Vec<String>) -> Result<Self> {
        let mut argv = argv.into_iter();
        let program = argv.next().ok_or(BridgeError::MissingCommand)?;
        if program.is_empty() {
            return Err(BridgeError::MissingCommand);
        }
        Ok(Self {
            program,
            args: argv.collect(),
        })
    }

    /// Become the target command. Returns only if the exec failed.
    pub fn exec(self, exec: &dyn ProcessExec) -> BridgeError {
        tracing::info!(program = %self.program, args = self.args.len(), "exec");
        let source = exec.exec(&self.program, &self.args);
        BridgeError::Exec {
            program: self.program,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use keybridge_keys::KeyInfo;

    use super::*;
    use crate::keyring::MemoryKeyring;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[derive(Default)]
    struct RecordingExec {
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl ProcessExec for RecordingExec {
        fn exec(&self, program: &str, args: &[String]) -> std::io::Error {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_owned(), args.to_vec()));
            std::io::Error::other("recorded")
        }
    }

    #[test]
    fn installs_keys_then_hands_off() {
        let set = CredentialSet::from_keys([
            KeyInfo::new("a", "u", "1"),
            KeyInfo::new("b", "u", "2"),
        ])
        .unwrap();
        let input = codec::encode(&set).unwrap();

        let entry = Entrypoint::new(MemoryKeyring::new());
        let handoff = entry
            .prepare(input.as_slice(), argv(&["/bin/app", "--serve"]))
            .unwrap();
        assert_eq!(entry.keyring().descriptions(), vec!["a", "b"]);
        assert_eq!(handoff.program, "/bin/app");
        assert_eq!(handoff.args, argv(&["--serve"]));
    }

    #[test]
    fn blank_stdin_goes_straight_to_handoff() {
        let entry = Entrypoint::new(MemoryKeyring::new());
        let handoff = entry.prepare(&b""[..], argv(&["true"])).unwrap();
        assert!(entry.keyring().is_empty());
        assert_eq!(handoff.program, "true");
    }

    #[test]
    fn first_install_failure_aborts() {
        let set = CredentialSet::from_keys([
            KeyInfo::new("ok", "u", "1"),
            KeyInfo::new("bad", "u", "2"),
            KeyInfo::new("never", "u", "3"),
        ])
        .unwrap();
        let entry = Entrypoint::new(MemoryKeyring::rejecting("bad"));
        let err = entry
            .prepare(codec::encode(&set).unwrap().as_slice(), argv(&["app"]))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InstallFailure { ref key_id, .. } if key_id == "bad"));
        assert_eq!(entry.keyring().descriptions(), vec!["ok"]);
    }

    #[test]
    fn missing_command_is_rejected_before_reading() {
        let entry = Entrypoint::new(MemoryKeyring::new());
        assert!(matches!(
            entry.prepare(&b"garbage"[..], Vec::new()),
            Err(BridgeError::MissingCommand)
        ));
    }

    #[test]
    fn malformed_stdin_is_an_error() {
        let entry = Entrypoint::new(MemoryKeyring::new());
        let err = entry
            .prepare(&br#"{"format":"other","payload":""}"#[..], argv(&["app"]))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Keys(_)));
    }

    #[test]
    fn handoff_exec_reports_failure() {
        let exec = RecordingExec::default();
        let handoff = Handoff::from_args(argv(&["app", "x", "y"])).unwrap();
        let err = handoff.exec(&exec);
        assert!(matches!(err, BridgeError::Exec { ref program, .. } if program == "app"));
        let calls = exec.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[("app".to_owned(), argv(&["x", "y"]))]);
    }

    #[cfg(unix)]
    #[test]
    fn system_exec_of_missing_binary_returns_error() {
        let err = SystemExec.exec("/nonexistent/keybridge-target", &[]);
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
