// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Poison-tolerant lock helpers.
//!
//! The authentication flag and the in-memory store sit behind `RwLock`s.
//! A listener or caller that panics while one of them is held would poison
//! it; every later `is_authenticated()` would then panic too. These helpers
//! log the poisoning and hand back the guard instead.
//!
//! ```
//! use std::sync::RwLock;
//! use workhub::security::locks::{resilient_read, resilient_write};
//!
//! let lock = RwLock::new(false);
//! *resilient_write(&lock) = true;
//! assert!(*resilient_read(&lock));
//! ```

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Acquire a read lock, recovering from poisoning.
#[inline]
pub fn resilient_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::error!(
            target: "security::locks",
            event = "LOCK_POISONED_READ",
            "RwLock was poisoned during read acquisition; recovering last written state"
        );
        poisoned.into_inner()
    })
}

/// Acquire a write lock, recovering from poisoning.
#[inline]
pub fn resilient_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::error!(
            target: "security::locks",
            event = "LOCK_POISONED_WRITE",
            "RwLock was poisoned during write acquisition; recovering last written state"
        );
        poisoned.into_inner()
    })
}
