//! crates/clarity_io/src/lib.rs
//! Minimal, single-source-of-truth I/O crate.
//!
//! - No inline implementations: we re-export the file modules to avoid drift.
//! - Shared error type (`IoError`) with `From` conversions used across modules.
//! - Public surface kept stable; details live in submodules.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Unified error for clarity_io (used by canonical_json/manifest/hasher/loader/cache).
#[derive(Debug, Error)]
pub enum IoError {
    /// Filesystem / path errors (create_dir_all, rename, fsync, etc.)
    #[error("io/path error: {0}")]
    Path(String),

    /// JSON serialization/deserialization errors with an optional JSON Pointer.
    #[error("json error at {pointer}: {msg}")]
    Json { pointer: String, msg: String },

    /// Hashing-related errors (e.g., feature disabled, read failures).
    #[error("hash error: {0}")]
    Hash(String),

    /// Required key missing from a manifest or trace-pack record.
    #[error("missing required field {field} in {context}")]
    MissingField { context: String, field: String },

    /// Required artifact file is absent on disk after a successful run.
    #[error("artifact absent: {0}")]
    ArtifactAbsent(String),

    /// Cache entry is being generated by another process and the wait timed out.
    #[error("cache entry in progress for key {0}")]
    CacheInProgress(String),

    /// Generic validation / invariants.
    #[error("invalid: {0}")]
    Invalid(String),
}

pub type IoResult<T> = Result<T, IoError>;

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        IoError::Json {
            pointer: "/".to_string(),
            msg: e.to_string(),
        }
    }
}

/* ---------------- Public modules (single source of truth) ----------------
   IMPORTANT: These correspond to files:
     - src/canonical_json.rs
     - src/hasher.rs
     - src/manifest.rs
     - src/loader.rs
     - src/cache.rs
   Remove ALL inline duplicates to prevent drift.
------------------------------------------------------------------------- */

pub mod canonical_json;
pub mod cache;
pub mod hasher;
pub mod loader;
pub mod manifest;

/// Compute SHA-256 hex of `bytes` or return an error when hashing is unavailable.
pub fn try_sha256_hex(bytes: &[u8]) -> Result<String, IoError> {
    #[cfg(feature = "hash")]
    {
        Ok(crate::hasher::sha256_hex(bytes))
    }
    #[cfg(not(feature = "hash"))]
    {
        Err(IoError::Hash("hash feature disabled".into()))
    }
}

pub mod prelude {
    pub use crate::{IoError, IoResult, try_sha256_hex};

    pub use crate::cache;
    pub use crate::canonical_json;
    pub use crate::hasher;
    pub use crate::loader;
    pub use crate::manifest;

    pub use crate::canonical_json::to_canonical_json_bytes;
    #[cfg(feature = "hash")]
    pub use crate::hasher::sha256_hex;
}
