//! Content-addressed cache (spec §4.13).
//!
//! Layout: `<cache_dir>/<key><ext>` holds the cached bytes; a sibling lock
//! file `<cache_dir>/<key>.lock` provides cross-process mutual exclusion
//! around `get_or_create`, using exclusive-create semantics
//! (`O_CREAT|O_EXCL`) the same way the teacher's canonical JSON writer uses
//! `OpenOptions::create_new` to avoid clobbering another writer's temp file.

#![forbid(unsafe_code)]

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::debug;

use crate::IoError;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new<P: Into<PathBuf>>(cache_dir: P) -> Self {
        Self { cache_dir: cache_dir.into() }
    }

    fn entry_path(&self, key: &str, ext: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}{ext}"))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.lock"))
    }

    /// True iff a cache entry for `key` with extension `ext` already exists.
    pub fn exists(&self, key: &str, ext: &str) -> bool {
        self.entry_path(key, ext).is_file()
    }

    /// Read the cached bytes for `key`, if present.
    pub fn get(&self, key: &str, ext: &str) -> Result<Option<Vec<u8>>, IoError> {
        let path = self.entry_path(key, ext);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read(&path).map_err(IoError::from)?))
    }

    /// Atomically write `bytes` as the cache entry for `key`.
    pub fn put(&self, key: &str, ext: &str, bytes: &[u8]) -> Result<(), IoError> {
        fs::create_dir_all(&self.cache_dir).map_err(IoError::from)?;
        let target = self.entry_path(key, ext);
        let tmp = self.cache_dir.join(format!("{key}{ext}.{}.tmp", std::process::id()));
        {
            let mut f = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp)
                .map_err(IoError::from)?;
            f.write_all(bytes).map_err(IoError::from)?;
            f.sync_all().map_err(IoError::from)?;
        }
        fs::rename(&tmp, &target).map_err(IoError::from)?;
        Ok(())
    }

    /// Return the cached bytes for `key`, generating them via `gen` if
    /// absent. At most one call across cooperating processes actually
    /// invokes `gen` for a given key: concurrent callers block on a lock
    /// file, polling every 100ms, until either the winner's entry appears
    /// or `timeout` elapses (in which case `IoError::CacheInProgress` is
    /// returned).
    pub fn get_or_create<F>(
        &self,
        key: &str,
        ext: &str,
        timeout: Duration,
        gen: F,
    ) -> Result<Vec<u8>, IoError>
    where
        F: FnOnce() -> Result<Vec<u8>, IoError>,
    {
        if let Some(bytes) = self.get(key, ext)? {
            debug!("cache hit for {key}{ext}");
            return Ok(bytes);
        }

        fs::create_dir_all(&self.cache_dir).map_err(IoError::from)?;
        let lock_path = self.lock_path(key);
        let deadline = Instant::now() + timeout;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
                Ok(mut lock_file) => {
                    let _ = write!(lock_file, "{}", std::process::id());
                    debug!("acquired cache lock for {key}");
                    let result = (|| {
                        if let Some(bytes) = self.get(key, ext)? {
                            return Ok(bytes);
                        }
                        let bytes = gen()?;
                        self.put(key, ext, &bytes)?;
                        Ok(bytes)
                    })();
                    let _ = fs::remove_file(&lock_path);
                    return result;
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if let Some(bytes) = self.get(key, ext)? {
                        return Ok(bytes);
                    }
                    if Instant::now() >= deadline {
                        return Err(IoError::CacheInProgress(key.to_string()));
                    }
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => return Err(IoError::from(e)),
            }
        }
    }

    /// Remove every cache entry and lock file under the cache directory.
    pub fn clear(&self) -> Result<(), IoError> {
        if !self.cache_dir.is_dir() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.cache_dir).map_err(IoError::from)? {
            let entry = entry.map_err(IoError::from)?;
            if entry.path().is_file() {
                fs::remove_file(entry.path()).map_err(IoError::from)?;
            }
        }
        Ok(())
    }
}

/// Compute the case hash used by the HTTP surface's cache key (spec §4.13
/// / §6): SHA-256 of the canonical bytes of `manifest.json`, `metrics.json`,
/// and `overlay_bundle.json` joined by `"\n"`. Callers must pre-quantize
/// every float in those values via `clarity_core::round8` before calling.
pub fn case_hash(manifest: &[u8], metrics: &[u8], overlay_bundle: &[u8]) -> String {
    let joined = [manifest, b"\n", metrics, b"\n", overlay_bundle].concat();
    crate::hasher::sha256_hex(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let cache = CacheManager::new(dir.path());
        cache.put("k1", ".bin", b"hello").unwrap();
        assert_eq!(cache.get("k1", ".bin").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn get_or_create_generates_at_most_once() {
        let dir = tempdir().unwrap();
        let cache = CacheManager::new(dir.path());
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let gen = || {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(b"generated".to_vec())
        };
        let a = cache
            .get_or_create("k2", ".bin", Duration::from_secs(1), gen)
            .unwrap();
        let b = cache
            .get_or_create("k2", ".bin", Duration::from_secs(1), || {
                Ok(b"should not run".to_vec())
            })
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }
}
