//! Container launch (sender side).
//!
//! [`ContainerLauncher::run`] writes the merged profile to a temporary file,
//! starts the launcher as
//!
//! ```text
//! docker run -i --security-opt seccomp=<profile> <user args...>
//! ```
//!
//! and pipes the encoded credential set into the container's standard
//! input. The launcher's own stdout and stderr are inherited.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use keybridge_keys::{CredentialSet, codec};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{BridgeError, Result};
use crate::profile;

/// Default container launcher, resolved through `PATH`.
pub const DEFAULT_LAUNCHER: &str = "docker";

/// Arguments the launcher always receives first, and which are therefore
/// dropped from user arguments.
const IMPLIED_ARGS: [&str; 3] = ["run", "-i", "--interactive"];

/// When the temporary profile file is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProfileCleanup {
    /// As soon as the launcher process has been started.
    #[default]
    AfterSpawn,
    /// Once the launcher has exited.
    AfterExit,
}

/// Settings for [`ContainerLauncher`].
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Launcher executable.
    ///
    /// Default: **docker**.
    pub launcher: PathBuf,

    /// Arguments inserted between the security options and the user's
    /// arguments.
    ///
    /// Default: none.
    pub extra_args: Vec<String>,

    /// Default: [`ProfileCleanup::AfterSpawn`].
    pub profile_cleanup: ProfileCleanup,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            launcher: PathBuf::from(DEFAULT_LAUNCHER),
            extra_args: Vec::new(),
            profile_cleanup: ProfileCleanup::default(),
        }
    }
}

impl LaunchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_launcher(mut self, launcher: impl Into<PathBuf>) -> Self {
        self.launcher = launcher.into();
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn with_profile_cleanup(mut self, cleanup: ProfileCleanup) -> Self {
        self.profile_cleanup = cleanup;
        self
    }
}

/// Build the launcher's argument list.
///
/// Every `run`, `-i` and `--interactive` in `user_args` is dropped since the
/// prefix already supplies them; everything else is forwarded in order.
pub fn launch_args<S: AsRef<str>>(profile_path: &Path, user_args: &[S]) -> Vec<String> {
    let mut args = vec![
        "run".to_owned(),
        "-i".to_owned(),
        "--security-opt".to_owned(),
        format!("seccomp={}", profile_path.display()),
    ];
    args.extend(
        user_args
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|a| !IMPLIED_ARGS.contains(a))
            .map(str::to_owned),
    );
    args
}

/// Starts containers with a credential set on their standard input.
pub struct ContainerLauncher {
    config: LaunchConfig,
}

impl ContainerLauncher {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// Launch a container and wait for it to exit.
    ///
    /// # Errors
    ///
    /// [`BridgeError::LauncherFailed`] if the launcher exits unsuccessfully.
    pub async fn run(
        &self,
        set: &CredentialSet,
        profile: &Value,
        user_args: &[String],
    ) -> Result<ExitStatus> {
        let payload = codec::encode(set)?;
        let profile_file = profile::write_temp_profile(profile)?;

        let user: Vec<&str> = self
            .config
            .extra_args
            .iter()
            .chain(user_args)
            .map(String::as_str)
            .collect();
        let args = launch_args(profile_file.path(), user.as_slice());
        let program = self.config.launcher.display().to_string();
        let command_line = format!("{program} {}", args.join(" "));

        tracing::info!(launcher = %program, keys = set.len(), "starting container");
        tracing::debug!(command = %command_line, "launcher command line");

        let mut child = Command::new(&self.config.launcher)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| BridgeError::Spawn {
                program: program.clone(),
                source,
            })?;

        let mut pending_profile = Some(profile_file);
        if self.config.profile_cleanup == ProfileCleanup::AfterSpawn {
            remove_profile(pending_profile.take());
        }

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&payload).await {
                Ok(()) => stdin.shutdown().await?,
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::warn!(
                        launcher = %program,
                        "launcher closed stdin before reading credentials"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        let status = child.wait().await?;
        remove_profile(pending_profile);

        if !status.success() {
            return Err(BridgeError::LauncherFailed {
                command: command_line,
                status,
            });
        }
        tracing::info!(launcher = %program, "container exited");
        Ok(status)
    }
}

fn remove_profile(file: Option<tempfile::NamedTempFile>) {
    let Some(file) = file else { return };
    let path = file.path().to_owned();
    if let Err(e) = file.close() {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove seccomp profile");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_args_prefix_and_filtering() {
        let args = launch_args(
            Path::new("/tmp/p.json"),
            &["run", "-i", "--rm", "--interactive", "alpine", "sh"],
        );
        assert_eq!(
            args,
            vec![
                "run",
                "-i",
                "--security-opt",
                "seccomp=/tmp/p.json",
                "--rm",
                "alpine",
                "sh"
            ]
        );
    }

    #[test]
    fn launch_args_without_user_args() {
        let args = launch_args::<&str>(Path::new("p"), &[]);
        assert_eq!(args, vec!["run", "-i", "--security-opt", "seccomp=p"]);
    }

    #[test]
    fn default_launch_config() {
        let cfg = LaunchConfig::default();
        assert_eq!(cfg.launcher, PathBuf::from("docker"));
        assert!(cfg.extra_args.is_empty());
        assert_eq!(cfg.profile_cleanup, ProfileCleanup::AfterSpawn);
    }

    #[tokio::test]
    async fn missing_launcher_is_spawn_error() {
        let launcher = ContainerLauncher::new(
            LaunchConfig::new().with_launcher("/nonexistent/keybridge-launcher"),
        );
        let err = launcher
            .run(&CredentialSet::new(), &serde_json::json!({"syscalls": []}), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Spawn { .. }));
    }
}
