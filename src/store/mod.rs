// src/store/mod.rs

//! Durable file-backed state: the rotating health event log and its daily
//! archive snapshots. All mutation is a whole-file rewrite through a
//! temp-then-rename, so readers never observe a partial write.

pub mod archive;
pub mod event_log;

use serde::Serialize;
use std::path::Path;

use crate::error::StorageError;

/// Serialize `value` and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Corrupt {
        path: path.to_path_buf(),
        source: e,
    })?;

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &json).map_err(|e| StorageError::Io {
        op: "write",
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| StorageError::Io {
        op: "rename",
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
