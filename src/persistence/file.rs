// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON file persistence.
//!
//! The whole key space lives in one small JSON object. It is loaded once at
//! open and written through on every change (temp file + rename, so a crash
//! never leaves a half-written file behind).

use crate::error::PersistenceError;
use crate::persistence::LocalPersistence;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Key-value store backed by a JSON file.
#[derive(Debug)]
pub struct FilePersistence {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FilePersistence {
    /// Open (or create) the store at `path`.
    ///
    /// A missing file starts empty. So does an unreadable one: the contents
    /// are only a cache, so a warning is logged and the file is overwritten
    /// on the next write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let values = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(values) => values,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Local storage file unreadable, starting empty"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "Opened local storage");

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the full map to disk. Caller holds the lock.
    fn write_out(&self, values: &BTreeMap<String, String>) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(values)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalPersistence for FilePersistence {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut values = self.lock();
        let mut updated = values.clone();
        updated.insert(key.to_string(), value.to_string());
        self.write_out(&updated)?;
        *values = updated;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let mut values = self.lock();
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut updated = values.clone();
        updated.remove(key);
        self.write_out(&updated)?;
        *values = updated;
        Ok(())
    }
}
