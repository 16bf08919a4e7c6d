//! Kernel keyring access.
//!
//! The receiver installs each token as a `user` key in the calling process's
//! session keyring, named after the key id. [`SessionKeyring`] talks to the
//! kernel directly through `add_key(2)` and `keyctl(2)`; [`MemoryKeyring`]
//! stands in for it where the kernel keyring is unavailable.

use std::io;
use std::sync::{Mutex, OnceLock};

/// Serial number of a key in the kernel keyring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId(pub i32);

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destination for installed keys.
pub trait Keyring {
    /// Create or replace the key `description` with `payload`.
    fn add(&self, description: &str, payload: &[u8]) -> io::Result<KeyId>;
}

impl<K: Keyring + ?Sized> Keyring for &K {
    fn add(&self, description: &str, payload: &[u8]) -> io::Result<KeyId> {
        (**self).add(description, payload)
    }
}

// ---------------------------------------------------------------------------
// Kernel session keyring
// ---------------------------------------------------------------------------

/// The calling process's session keyring.
///
/// The keyring is resolved on first use and created if the process has
/// none, so constructing one never touches the kernel.
#[derive(Debug, Default)]
pub struct SessionKeyring {
    id: OnceLock<i32>,
}

impl SessionKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the session keyring immediately.
    pub fn open() -> io::Result<Self> {
        let ring = Self::new();
        ring.id()?;
        Ok(ring)
    }

    /// Serial of the session keyring.
    pub fn id(&self) -> io::Result<KeyId> {
        if let Some(id) = self.id.get() {
            return Ok(KeyId(*id));
        }
        let id = sys::session_keyring_id()?;
        tracing::debug!(keyring = id, "opened session keyring");
        Ok(KeyId(*self.id.get_or_init(|| id)))
    }
}

impl Keyring for SessionKeyring {
    fn add(&self, description: &str, payload: &[u8]) -> io::Result<KeyId> {
        let keyring = self.id()?;
        sys::add_user_key(description, payload, keyring.0).map(KeyId)
    }
}

/// Look up the `user` key `description` in the session keyring and return
/// its payload.
pub fn read_session_key(description: &str) -> io::Result<Vec<u8>> {
    let key = sys::search_user_key(description)?;
    sys::read_key(key)
}

#[cfg(target_os = "linux")]
mod sys {
    use std::ffi::{CStr, CString};
    use std::io;

    use libc::{c_long, c_void};

    const KEY_SPEC_SESSION_KEYRING: c_long = -3;
    const KEYCTL_GET_KEYRING_ID: c_long = 0;
    const KEYCTL_SEARCH: c_long = 10;
    const KEYCTL_READ: c_long = 11;
    const KEY_TYPE_USER: &CStr = c"user";

    fn check(ret: c_long) -> io::Result<c_long> {
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret)
        }
    }

    fn c_description(description: &str) -> io::Result<CString> {
        CString::new(description).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "key description contains a NUL byte",
            )
        })
    }

    pub fn session_keyring_id() -> io::Result<i32> {
        // SAFETY: KEYCTL_GET_KEYRING_ID takes two integer arguments.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_keyctl,
                KEYCTL_GET_KEYRING_ID,
                KEY_SPEC_SESSION_KEYRING,
                1 as c_long,
            )
        };
        check(ret).map(|id| id as i32)
    }

    pub fn add_user_key(description: &str, payload: &[u8], keyring: i32) -> io::Result<i32> {
        let desc = c_description(description)?;
        // SAFETY: both strings are NUL terminated and outlive the call; the
        // payload pointer is valid for `payload.len()` bytes.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_add_key,
                KEY_TYPE_USER.as_ptr(),
                desc.as_ptr(),
                payload.as_ptr() as *const c_void,
                payload.len(),
                keyring as c_long,
            )
        };
        check(ret).map(|id| id as i32)
    }

    pub fn search_user_key(description: &str) -> io::Result<i32> {
        let desc = c_description(description)?;
        // SAFETY: both strings are NUL terminated and outlive the call.
        let ret = unsafe {
            libc::syscall(
                libc::SYS_keyctl,
                KEYCTL_SEARCH,
                KEY_SPEC_SESSION_KEYRING,
                KEY_TYPE_USER.as_ptr(),
                desc.as_ptr(),
                0 as c_long,
            )
        };
        check(ret).map(|id| id as i32)
    }

    pub fn read_key(key: i32) -> io::Result<Vec<u8>> {
        let mut buf: Vec<u8> = Vec::new();
        loop {
            // SAFETY: the buffer pointer is valid for `buf.len()` bytes; a
            // zero length with a null pointer only queries the size.
            let ret = unsafe {
                libc::syscall(
                    libc::SYS_keyctl,
                    KEYCTL_READ,
                    key as c_long,
                    if buf.is_empty() {
                        std::ptr::null_mut()
                    } else {
                        buf.as_mut_ptr() as *mut c_void
                    },
                    buf.len(),
                )
            };
            let size = check(ret)? as usize;
            if size <= buf.len() {
                buf.truncate(size);
                return Ok(buf);
            }
            buf.resize(size, 0);
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use std::io;

    fn unsupported<T>() -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("kernel keyrings are not available on {}", std::env::consts::OS),
        ))
    }

    pub fn session_keyring_id() -> io::Result<i32> {
        unsupported()
    }

    pub fn add_user_key(_description: &str, _payload: &[u8], _keyring: i32) -> io::Result<i32> {
        unsupported()
    }

    pub fn search_user_key(_description: &str) -> io::Result<i32> {
        unsupported()
    }

    pub fn read_key(_key: i32) -> io::Result<Vec<u8>> {
        unsupported()
    }
}

// ---------------------------------------------------------------------------
// In-memory keyring
// ---------------------------------------------------------------------------

/// Process-local keyring for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryKeyring {
    keys: Mutex<Vec<(String, Vec<u8>)>>,
    reject: Option<String>,
}

impl MemoryKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every attempt to add `description`.
    pub fn rejecting(description: impl Into<String>) -> Self {
        Self {
            keys: Mutex::default(),
            reject: Some(description.into()),
        }
    }

    pub fn get(&self, description: &str) -> Option<Vec<u8>> {
        self.lock()
            .iter()
            .find(|(d, _)| d == description)
            .map(|(_, p)| p.clone())
    }

    /// Key descriptions in installation order.
    pub fn descriptions(&self) -> Vec<String> {
        self.lock().iter().map(|(d, _)| d.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, Vec<u8>)>> {
        self.keys.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Keyring for MemoryKeyring {
    fn add(&self, description: &str, payload: &[u8]) -> io::Result<KeyId> {
        if self.reject.as_deref() == Some(description) {
            return Err(io::Error::other("key quota exceeded"));
        }
        let mut keys = self.lock();
        let idx = match keys.iter().position(|(d, _)| d == description) {
            Some(idx) => {
                keys[idx].1 = payload.to_vec();
                idx
            }
            None => {
                keys.push((description.to_owned(), payload.to_vec()));
                keys.len() - 1
            }
        };
        Ok(KeyId(idx as i32 + 1))
    }
}
