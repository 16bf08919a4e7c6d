//! Plugin client.
//!
//! Every call spawns a fresh helper process, writes one request to its
//! standard input, closes it, and reads standard output to end of stream.
//! The helper is killed if it outlives [`PluginConfig::timeout`].

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::PluginConfig;
use crate::error::{PluginError, Result};
use crate::protocol::{Request, Response};

/// Secure note access through the entitled helper.
pub struct PluginClient {
    config: PluginConfig,
    next_id: AtomicU64,
}

impl PluginClient {
    pub fn new(config: PluginConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Read the secure note `keyname`.
    ///
    /// # Errors
    ///
    /// [`PluginError::KeyNotFound`] if the note does not exist.
    pub async fn read(&self, keyname: &str) -> Result<Vec<u8>> {
        let request = Request::read(self.next_id(), keyname, &self.config.sys_specific())?;
        let contents = self.call(request).await?;
        Ok(contents.unwrap_or_default())
    }

    /// Create (or, with update-in-place, replace) the secure note `keyname`.
    ///
    /// # Errors
    ///
    /// [`PluginError::KeyExists`] if the note exists and update-in-place is
    /// off.
    pub async fn write(&self, keyname: &str, contents: &[u8]) -> Result<()> {
        let request = Request::write(
            self.next_id(),
            keyname,
            contents.to_vec(),
            &self.config.sys_specific(),
        )?;
        self.call(request).await.map(|_| ())
    }

    /// Run one request against a fresh helper and return the response
    /// contents.
    pub async fn call(&self, request: Request) -> Result<Option<Vec<u8>>> {
        let (response, stderr) = self.roundtrip(&request).await?;
        if response.id != request.id {
            return Err(PluginError::IdMismatch {
                expected: request.id,
                found: response.id,
            });
        }
        response.into_result(&request.keyname, &stderr)
    }

    async fn roundtrip(&self, request: &Request) -> Result<(Response, String)> {
        let binary = self.config.binary.display().to_string();
        let mut payload = serde_json::to_vec(request)?;
        payload.push(b'\n');

        tracing::debug!(
            id = request.id,
            key = %request.keyname,
            write = request.write,
            binary = %binary,
            "sending plugin request"
        );

        let mut child = Command::new(&self.config.binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PluginError::Spawn {
                binary: binary.clone(),
                source,
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            PluginError::Io(std::io::Error::other("plugin stdin was not captured"))
        })?;

        let exchange = async move {
            match stdin.write_all(&payload).await {
                // The helper may answer and exit before reading everything.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                other => other?,
            }
            drop(stdin);
            child.wait_with_output().await
        };

        let limit = self.config.timeout;
        let output = tokio::time::timeout(limit, exchange)
            .await
            .map_err(|_| {
                tracing::warn!(id = request.id, binary = %binary, "plugin timed out, killed");
                PluginError::Timeout {
                    limit_ms: limit.as_millis() as u64,
                }
            })??;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        let stdout = output.stdout.trim_ascii();
        if stdout.is_empty() {
            return Err(PluginError::Plugin {
                message: "plugin returned no response".into(),
                detail: format!("{binary} exited with {}", output.status),
                stderr,
            });
        }

        let response: Response =
            serde_json::from_slice(stdout).map_err(|e| PluginError::Plugin {
                message: "failed to decode plugin response".into(),
                detail: e.to_string(),
                stderr: stderr.clone(),
            })?;

        tracing::debug!(
            id = response.id,
            status = %output.status,
            error = response.error.is_some(),
            "received plugin response"
        );
        Ok((response, stderr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_per_client() {
        let client = PluginClient::new(PluginConfig::default());
        let a = client.next_id();
        let b = client.next_id();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let client = PluginClient::new(
            PluginConfig::new().with_binary("/nonexistent/keybridge-test-helper"),
        );
        let err = client.read("svc").await.unwrap_err();
        assert!(matches!(err, PluginError::Spawn { .. }));
    }
}
