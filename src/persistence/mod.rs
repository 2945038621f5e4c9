// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local key-value persistence surviving process restarts.
//!
//! Used as a fast cache mirroring remote state, and as the only home of the
//! role preference and the identity provider's saved session.

pub mod file;
pub mod memory;

pub use file::FilePersistence;
pub use memory::MemoryPersistence;

use crate::error::PersistenceError;
use std::sync::Arc;

/// Storage keys as constants.
pub mod keys {
    pub const ROLE: &str = "role-preference";
    pub const SCAN_HISTORY: &str = "scan-history";
    pub const VIEWED_TOPICS: &str = "viewed-topics";
    /// Identity provider refresh token
    pub const AUTH_SESSION: &str = "auth-session";
}

/// Synchronous string key-value store.
pub trait LocalPersistence: Send + Sync + 'static {
    /// Read a value, or `None` if the key is absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    /// Delete a value. Deleting an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

impl<T: LocalPersistence> LocalPersistence for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        (**self).remove(key)
    }
}
