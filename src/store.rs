//! Flat-file JSON persistence: one file per logical store, read fully into
//! memory at load and rewritten fully on every mutation.
//!
//! Writes are driven by the single event loop, so last-writer-wins is
//! adequate; there is no optimistic concurrency control.

use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

pub struct JsonStore<T> {
    path: PathBuf,
    value: T,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Load the whole store. A missing file starts from `T::default()`; a
    /// present-but-unreadable or malformed file is an error, not silently
    /// reset.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let value = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|cause| StoreError::Corrupt {
                    path: path.display().to_string(),
                    cause,
                })?
            }
            Err(cause) if cause.kind() == std::io::ErrorKind::NotFound => T::default(),
            Err(cause) => {
                return Err(StoreError::ReadFailed {
                    path: path.display().to_string(),
                    cause,
                });
            }
        };
        Ok(Self { path, value })
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Mutate in memory, then rewrite the whole file.
    pub fn update<R>(&mut self, mutate: impl FnOnce(&mut T) -> R) -> Result<R, StoreError> {
        let out = mutate(&mut self.value);
        self.save()?;
        Ok(out)
    }

    fn save(&self) -> Result<(), StoreError> {
        let display = || self.path.display().to_string();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|cause| StoreError::WriteFailed {
                    path: display(),
                    cause,
                })?;
            }
        }
        let json = serde_json::to_string_pretty(&self.value).map_err(|cause| {
            StoreError::EncodeFailed {
                path: display(),
                cause,
            }
        })?;
        std::fs::write(&self.path, json).map_err(|cause| StoreError::WriteFailed {
            path: display(),
            cause,
        })
    }
}
