// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session Store
//!
//! Key-value persistence for the held credential, the cached identity and a
//! few UI preferences. Values are opaque strings; the identity is stored as
//! serialized JSON under [`USER_KEY`].
//!
//! Two implementations are provided:
//!
//! - [`MemoryStore`] for tests and embedding
//! - [`FileStore`], a single JSON document on disk

use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::StoreError;
use crate::security::locks::{resilient_read, resilient_write};

/// Key holding the raw credential.
pub const TOKEN_KEY: &str = "token";
/// Key holding the serialized identity.
pub const USER_KEY: &str = "user";
/// Key holding the sidebar collapse preference (JSON boolean).
pub const SIDEBAR_COLLAPSED_KEY: &str = "sidebarCollapsed";

/// File name used by [`FileStore`] inside its directory.
pub const STORE_FILE_NAME: &str = "session.json";
/// Advisory lock file next to [`STORE_FILE_NAME`].
pub const LOCK_FILE_NAME: &str = "session.lock";

/// How long [`FileStore`] waits for another process's lock.
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
/// Retry interval while waiting for a lock.
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Persistence surface the session manager reads and writes.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Volatile store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        resilient_read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        resilient_read(&self.entries).is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(resilient_read(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        resilient_write(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        resilient_write(&self.entries).remove(key);
        Ok(())
    }
}

/// Store persisted as one JSON object in `<dir>/session.json`.
///
/// Every call re-reads the file so that two processes sharing a directory
/// observe each other's writes. Access is coordinated through an advisory
/// lock on `<dir>/session.lock`: shared for reads, exclusive for the whole
/// read, write, rename cycle of a mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl FileStore {
    /// Open (or lazily create) a store in `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }

        Ok(Self {
            path: dir.join(STORE_FILE_NAME),
            lock_path: dir.join(LOCK_FILE_NAME),
            lock_timeout: LOCK_TIMEOUT,
        })
    }

    /// Open the store in the default location, `~/.workhub`.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(crate::config::default_data_dir()?)
    }

    /// Override how long to wait for another process's lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the lock file, retrying until the timeout expires.
    ///
    /// The lock is released when the returned handle is dropped.
    fn lock(&self, exclusive: bool) -> Result<File, StoreError> {
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;

        let start = Instant::now();
        loop {
            // Trait path: std's inherent File::try_lock_shared has a different error type.
            let attempt = if exclusive {
                FileExt::try_lock_exclusive(&lock_file)
            } else {
                FileExt::try_lock_shared(&lock_file)
            };

            match attempt {
                Ok(()) => return Ok(lock_file),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= self.lock_timeout {
                        return Err(StoreError::LockTimeout {
                            path: self.lock_path.clone(),
                            timeout: self.lock_timeout,
                        });
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Caller must hold the exclusive lock.
    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut tmp_file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            tmp_file.write_all(content.as_bytes())?;
            tmp_file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> bool) -> Result<(), StoreError> {
        let _guard = self.lock(true)?;
        let mut entries = self.read_all()?;
        if f(&mut entries) {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock(false)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })?;
        tracing::debug!("STORE_SET | key={} path={}", key, self.path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.modify(|entries| entries.remove(key).is_some())?;
        tracing::debug!("STORE_REMOVE | key={} path={}", key, self.path.display());
        Ok(())
    }
}
