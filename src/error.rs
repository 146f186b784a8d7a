// src/error.rs
// Error taxonomy for the self-repair pipeline.
//
// Probe-level failures are caught inside the health engine and converted to
// findings; only storage write failures and authorization failures surface
// to the caller as request failures.

use std::path::PathBuf;
use thiserror::Error;

/// Log / archive store failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt JSON in {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum VigilError {
    /// Missing or malformed required settings. Reported as a finding,
    /// never a crash.
    #[error("configuration error: {0}")]
    Config(String),

    /// External dependency unreachable or returned unexpected content.
    #[error("probe failure: {0}")]
    Probe(String),

    /// Log/archive file unreadable or unwritable. Reads degrade to an
    /// empty-log assumption; writes propagate.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The repair engine could not apply a patch. Collected into the fix
    /// report's notes, does not abort remaining patches.
    #[error("rewrite failed for {path}: {reason}")]
    Rewrite { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, VigilError>;
