//! CLI entry point for Keybridge.
//!
//! This binary provides the `keybridge` command. Payloads go to stdout and
//! everything else, logs and errors included, goes to stderr.

use anyhow::Result;
use clap::Parser;
use keybridge_bridge::BridgeError;
use keybridge_cli::cli::{Cli, Commands};
use keybridge_cli::config::AppConfig;
use keybridge_cli::helpers::init_tracing;
use keybridge_cli::{container, keychain};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `read` and `create-profile` write payloads to stdout; keep stderr quiet
    // unless RUST_LOG asks for more.
    let level = match &cli.command {
        Commands::Keychain { .. } | Commands::CreateProfile { output: None, .. } => "warn",
        _ => "info",
    };
    init_tracing(level);

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Keychain { action } => keychain::run(action, &config).await,
        Commands::Run(args) => match container::run(args, &config).await {
            Ok(_) => Ok(()),
            Err(err) => match err.downcast_ref::<BridgeError>() {
                // Mirror the launcher's own exit code.
                Some(BridgeError::LauncherFailed { status, .. }) => {
                    let code = status.code().unwrap_or(1);
                    tracing::error!(code, "container launcher failed");
                    std::process::exit(code);
                }
                _ => Err(err),
            },
        },
        Commands::Entrypoint { command } => container::entrypoint(command),
        Commands::CreateProfile { output, profile } => {
            container::create_profile(output.as_deref(), &profile).await
        }
    }
}
