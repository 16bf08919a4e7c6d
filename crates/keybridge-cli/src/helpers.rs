//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization and payload input/output. Logs always go
//! to stderr so that stdout carries nothing but payload bytes.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Initialize a JSON-lines subscriber on stderr, for the keychain helper.
pub fn init_json_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .json()
        .init();
}

// ---------------------------------------------------------------------------
// Payload I/O
// ---------------------------------------------------------------------------

/// Read a payload from `path`, or from stdin when `path` is absent or `-`.
pub fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut data = Vec::new();
            std::io::stdin()
                .lock()
                .read_to_end(&mut data)
                .context("failed to read stdin")?;
            Ok(data)
        }
    }
}

/// Write raw payload bytes to stdout.
pub fn write_stdout(data: &[u8]) -> Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(data).context("failed to write stdout")?;
    out.flush().context("failed to write stdout")?;
    Ok(())
}

/// Write `data` to `path`, readable only by the owner on unix.
pub fn write_private_file(path: &Path, data: &[u8]) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(data)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_input_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload");
        std::fs::write(&path, b"contents").unwrap();
        assert_eq!(read_input(Some(&path)).unwrap(), b"contents");
    }

    #[test]
    fn read_input_missing_file_names_path() {
        let err = read_input(Some(Path::new("/nonexistent/keybridge-input"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/keybridge-input"));
    }

    #[test]
    fn private_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        write_private_file(&path, b"{}\n").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
