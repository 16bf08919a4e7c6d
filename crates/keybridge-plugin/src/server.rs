//! Helper-side request handling.
//!
//! The helper reads one [`Request`], runs it against a [`SecureNoteStore`],
//! and writes one [`Response`]. Every step that can fail still produces a
//! well-formed response:
//!
//! - a request that does not decode is rejected with id `0`
//! - a request whose `sys_specific` does not decode is rejected with its own id
//! - a vault that cannot be opened is reported with the request's id
//! - a response that cannot be serialized is replaced by an error response
//!   with the same id
//!
//! The operational log records ids, key names and store settings. Payloads
//! never reach it.

use std::io::{Read, Write};

use keybridge_vault::{SecureNoteStore, StoreOptions, VaultBackend, VaultError};
use serde::Deserialize;

use crate::protocol::{ErrorBody, KeychainConfig, Request, Response, SysSpecific};

/// Serves plugin requests against the backend a factory opens for each
/// request's vault settings.
pub struct PluginServer<F> {
    backend: F,
}

impl<F, B> PluginServer<F>
where
    F: Fn(&KeychainConfig) -> keybridge_vault::Result<B>,
    B: VaultBackend,
{
    pub fn new(backend: F) -> Self {
        Self { backend }
    }

    /// Decode one request and its vault settings.
    ///
    /// Trailing input after the first JSON value is ignored. On failure the
    /// returned response is ready to send.
    pub fn read_request<R: Read>(
        &self,
        reader: R,
    ) -> std::result::Result<(KeychainConfig, Request), Response> {
        let mut de = serde_json::Deserializer::from_reader(reader);
        let request = Request::deserialize(&mut de).map_err(|e| {
            tracing::error!(error = %e, "failed to decode request");
            Response::rejected(0, ErrorBody::new("failed to decode request", e.to_string()))
        })?;

        match request.sys_specific() {
            Ok(SysSpecific::MacosKeychain(config)) => {
                tracing::info!(
                    id = request.id,
                    key = %request.keyname,
                    account = %config.account,
                    keychain_type = %config.keychain_type,
                    keychain_path = ?config.keychain_path,
                    accessibility = %config.accessibility,
                    write = request.write,
                    update_in_place = config.update_in_place,
                    "new request"
                );
                Ok((config, request))
            }
            Err(e) => {
                tracing::error!(
                    id = request.id,
                    key = %request.keyname,
                    error = %e,
                    "failed to decode sys_specific"
                );
                Err(request.response(
                    None,
                    Some(ErrorBody::new(
                        "failed to decode keychain configuration",
                        e.to_string(),
                    )),
                ))
            }
        }
    }

    /// Execute a decoded request.
    pub fn handle_request(&self, config: &KeychainConfig, request: &Request) -> Response {
        let backend = match (self.backend)(config) {
            Ok(backend) => backend,
            Err(e) => {
                tracing::error!(id = request.id, error = %e, "failed to open keychain");
                let error = ErrorBody::new("failed to open keychain", e.to_string());
                return request.response(None, Some(error));
            }
        };
        let store = SecureNoteStore::new(
            backend,
            config.keychain_type,
            config.account.clone(),
            StoreOptions::new()
                .with_update_in_place(config.update_in_place)
                .with_accessibility(config.accessibility),
        );
        if request.write {
            self.handle_write(&store, request)
        } else {
            self.handle_read(&store, request)
        }
    }

    fn handle_write(&self, store: &SecureNoteStore<B>, request: &Request) -> Response {
        let Some(contents) = request.contents.as_deref() else {
            tracing::error!(
                id = request.id,
                key = %request.keyname,
                "write request without contents"
            );
            return request.response(
                None,
                Some(ErrorBody::new("write request has no contents", &request.keyname)),
            );
        };
        match store.write(&request.keyname, contents) {
            Ok(()) => {
                tracing::info!(id = request.id, key = %request.keyname, "secure note written");
                request.response(None, None)
            }
            Err(e) => {
                tracing::error!(
                    id = request.id,
                    key = %request.keyname,
                    error = %e,
                    "write failed"
                );
                let error = classify(e, "failed to write secure note", &request.keyname);
                request.response(None, Some(error))
            }
        }
    }

    fn handle_read(&self, store: &SecureNoteStore<B>, request: &Request) -> Response {
        match store.read(&request.keyname) {
            Ok(data) => {
                tracing::info!(id = request.id, key = %request.keyname, "secure note read");
                request.response(Some(data), None)
            }
            Err(e) => {
                tracing::error!(id = request.id, key = %request.keyname, error = %e, "read failed");
                let error = classify(e, "failed to read secure note", &request.keyname);
                request.response(None, Some(error))
            }
        }
    }

    /// Serialize `response` to `writer`, without `sys_specific`.
    pub fn send_response<W: Write>(
        &self,
        mut writer: W,
        mut response: Response,
    ) -> std::io::Result<()> {
        response.sys_specific = None;
        let mut bytes = match serde_json::to_vec(&response) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(id = response.id, error = %e, "failed to encode response");
                fallback_response(response.id, &e)
            }
        };
        bytes.push(b'\n');
        writer.write_all(&bytes)?;
        writer.flush()?;
        tracing::debug!(id = response.id, error = response.error.is_some(), "response sent");
        Ok(())
    }

    /// Read, handle and answer exactly one request.
    pub fn serve<R: Read, W: Write>(&self, reader: R, writer: W) -> std::io::Result<()> {
        let response = match self.read_request(reader) {
            Ok((config, request)) => self.handle_request(&config, &request),
            Err(rejected) => rejected,
        };
        self.send_response(writer, response)
    }
}

fn classify(error: VaultError, message: &str, keyname: &str) -> ErrorBody {
    if error.is_not_found() {
        ErrorBody::key_not_found(keyname)
    } else if error.is_already_exists() {
        ErrorBody::key_exists(keyname)
    } else {
        ErrorBody::new(message, error.to_string())
    }
}

fn fallback_response(id: u64, error: &serde_json::Error) -> Vec<u8> {
    let body = ErrorBody::new("failed to encode response", error.to_string());
    serde_json::to_vec(&Response::rejected(id, body)).unwrap_or_else(|_| {
        format!(r#"{{"id":{id},"error":{{"message":"failed to encode response","detail":""}}}}"#)
            .into_bytes()
    })
}
