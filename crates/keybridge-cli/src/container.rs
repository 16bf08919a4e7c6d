//! `keybridge run`, `keybridge entrypoint` and `keybridge create-profile`.

use std::path::Path;
use std::process::ExitStatus;

use anyhow::{Context, Result};
use keybridge_bridge::{
    BridgeError, ContainerLauncher, DEFAULT_PROFILE_URL, Entrypoint, ProfileSource,
    SessionKeyring, SystemExec, build_profile, write_profile,
};
use keybridge_keys::CredentialSet;

use crate::cli::{ProfileArgs, RunArgs};
use crate::config::AppConfig;
use crate::helpers;
use crate::keychain::{self, NoteAccess};

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Credentials named by `--keys-file` or `--keychain-item`. Neither means
/// an empty set.
pub async fn load_credentials(args: &RunArgs, config: &AppConfig) -> Result<CredentialSet> {
    if let Some(path) = &args.keys_file {
        let data = helpers::read_input(Some(path))?;
        return CredentialSet::from_key_list(&data)
            .with_context(|| format!("{} does not hold a key list", path.display()));
    }
    if let Some(item) = &args.keychain_item {
        let access = NoteAccess::from_args(&args.keychain, config)?;
        return keychain::load_key_set(&access, item).await;
    }
    tracing::warn!("no key source given, starting the container without credentials");
    Ok(CredentialSet::new())
}

/// Baseline for `run`: flags, then `[container] profile_url`, then the
/// embedded profile.
pub fn run_profile_source(profile: &ProfileArgs, config: &AppConfig) -> ProfileSource {
    let fallback = match &config.container.profile_url {
        Some(url) => ProfileSource::Url(url.clone()),
        None => ProfileSource::Embedded,
    };
    profile.source_or(fallback)
}

/// Start a container with the selected credentials piped to its stdin.
pub async fn run(args: RunArgs, config: &AppConfig) -> Result<ExitStatus> {
    let set = load_credentials(&args, config).await?;
    let source = run_profile_source(&args.profile, config);
    let profile = build_profile(&source)
        .await
        .with_context(|| format!("failed to build seccomp profile from {source}"))?;

    let mut launch = config.launch_config();
    if let Some(launcher) = &args.launcher {
        launch = launch.with_launcher(launcher.clone());
    }
    // Launcher failures keep their type so the caller can mirror the exit code.
    let status = ContainerLauncher::new(launch)
        .run(&set, &profile, &args.args)
        .await?;
    Ok(status)
}

// ---------------------------------------------------------------------------
// entrypoint
// ---------------------------------------------------------------------------

/// Install credentials from stdin and exec `command`. Returns only on
/// failure.
pub fn entrypoint(command: Vec<String>) -> Result<()> {
    let entry = Entrypoint::new(SessionKeyring::new());
    let handoff = entry
        .prepare(std::io::stdin().lock(), command)
        .context("failed to install credentials")?;
    let err: BridgeError = handoff.exec(&SystemExec);
    Err(err.into())
}

// ---------------------------------------------------------------------------
// create-profile
// ---------------------------------------------------------------------------

/// Baseline for `create-profile`: flags, then the upstream default profile.
pub fn create_profile_source(profile: &ProfileArgs) -> ProfileSource {
    profile.source_or(ProfileSource::Url(DEFAULT_PROFILE_URL.to_owned()))
}

/// Write the merged profile to `output`, or to stdout.
pub async fn create_profile(output: Option<&Path>, profile: &ProfileArgs) -> Result<()> {
    let source = create_profile_source(profile);
    let merged = build_profile(&source)
        .await
        .with_context(|| format!("failed to build seccomp profile from {source}"))?;

    let mut rendered = Vec::new();
    write_profile(&mut rendered, &merged)?;
    match output {
        Some(path) => {
            helpers::write_private_file(path, &rendered)?;
            tracing::info!(path = %path.display(), source = %source, "wrote seccomp profile");
        }
        None => helpers::write_stdout(&rendered)?,
    }
    Ok(())
}
