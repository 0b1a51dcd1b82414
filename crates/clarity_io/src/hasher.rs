//! SHA-256 hashing utilities over raw bytes, files, and canonical JSON,
//! plus the special streaming hash used for float tensors in rich-mode
//! logits hashing.
//!
//! Deterministic: same input bytes ⇒ same lowercase 64-hex across OS/arch.

#![forbid(unsafe_code)]

use crate::IoError;

#[cfg(feature = "hash")]
use digest::Digest;
#[cfg(feature = "hash")]
use sha2::Sha256;

#[cfg(all(feature = "hash", feature = "serde"))]
use crate::canonical_json::to_canonical_json_bytes;
#[cfg(all(feature = "hash", feature = "serde"))]
use serde::Serialize;

/// Compute lowercase 64-hex SHA-256 of raw bytes.
#[cfg(feature = "hash")]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(not(feature = "hash"))]
pub fn sha256_hex(_bytes: &[u8]) -> String {
    String::new()
}

/// Streaming SHA-256 for any reader; returns lowercase 64-hex. Reads in
/// 8 KiB chunks, matching the artifact-loader's chunk size (spec §4.2).
#[cfg(feature = "hash")]
pub fn sha256_stream<R: std::io::Read>(reader: &mut R) -> Result<String, IoError> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(IoError::from)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(not(feature = "hash"))]
pub fn sha256_stream<R: std::io::Read>(_reader: &mut R) -> Result<String, IoError> {
    Err(IoError::Hash("hash feature disabled".into()))
}

/// SHA-256 of raw bytes read from a file on disk.
#[cfg(feature = "hash")]
pub fn sha256_file<P: AsRef<std::path::Path>>(path: P) -> Result<String, IoError> {
    let mut f = std::fs::File::open(path).map_err(IoError::from)?;
    sha256_stream(&mut f)
}

#[cfg(not(feature = "hash"))]
pub fn sha256_file<P: AsRef<std::path::Path>>(_path: P) -> Result<String, IoError> {
    Err(IoError::Hash("hash feature disabled".into()))
}

/// SHA-256 of canonical JSON representation (sorted keys, compact); returns lowercase 64-hex.
#[cfg(all(feature = "hash", feature = "serde"))]
pub fn sha256_canonical<T: Serialize>(value: &T) -> Result<String, IoError> {
    let v = serde_json::to_value(value)?;
    let bytes = to_canonical_json_bytes(&v);
    Ok(sha256_hex(&bytes))
}

#[cfg(not(all(feature = "hash", feature = "serde")))]
pub fn sha256_canonical<T>(_value: &T) -> Result<String, IoError> {
    Err(IoError::Hash("hash+serde features required".into()))
}

/// Stable stringification of a single float for hashing purposes: fixed
/// `%.8e` scientific-notation format, with dedicated tokens for the
/// non-finite cases. Mirrors the rich-generation module's stable float
/// representation and underpins both the logits-hash streaming routine
/// below and `clarity_pipeline::rich::compute_summary_hash`.
pub fn stable_float_repr(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else {
        format!("{value:.8e}")
    }
}

/// Streaming SHA-256 over an iterator of floats (used for rich-mode logits
/// tensors too large to hold in memory as a canonical JSON array). Each
/// value is stringified via [`stable_float_repr`] and fed to the hasher
/// joined by `|`, so the result is independent of how the iterator batches
/// its items.
#[cfg(feature = "hash")]
pub fn sha256_stream_floats<I: IntoIterator<Item = f64>>(values: I) -> String {
    let mut hasher = Sha256::new();
    let mut first = true;
    for v in values {
        if !first {
            hasher.update(b"|");
        }
        first = false;
        hasher.update(stable_float_repr(v).as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(not(feature = "hash"))]
pub fn sha256_stream_floats<I: IntoIterator<Item = f64>>(_values: I) -> String {
    String::new()
}

/// True iff string is lowercase 64-hex.
pub fn is_hex64(s: &str) -> bool {
    s.len() == 64 && s.as_bytes().iter().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_is_stable() {
        assert_eq!(sha256_hex(b"clarity"), sha256_hex(b"clarity"));
        assert!(is_hex64(&sha256_hex(b"clarity")));
    }

    #[test]
    fn stable_float_repr_handles_non_finite() {
        assert_eq!(stable_float_repr(f64::NAN), "nan");
        assert_eq!(stable_float_repr(f64::INFINITY), "inf");
        assert_eq!(stable_float_repr(f64::NEG_INFINITY), "-inf");
        assert_eq!(stable_float_repr(1.5), "1.50000000e0");
    }

    #[test]
    fn sha256_stream_floats_is_order_sensitive() {
        let a = sha256_stream_floats(vec![1.0, 2.0]);
        let b = sha256_stream_floats(vec![2.0, 1.0]);
        assert_ne!(a, b);
    }
}
