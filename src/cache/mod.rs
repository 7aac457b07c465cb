//! Disk-backed content cache with TTL and stale fallback
//!
//! Fetched content is stored as one blob file per key under `<dir>/blobs/`,
//! indexed by `<dir>/manifest.json`. A fresh entry is served directly; an
//! expired or missing one is renewed through a caller-supplied callback,
//! and if renewal fails the last known content is served instead.
//!
//! # Layout
//!
//! | Path | Contents |
//! |------|----------|
//! | `manifest.json` | escaped key -> `{expiredTime, value}` |
//! | `blobs/<name>` | raw content, name stable per key |
//!
//! Manifest writes are debounced: a burst of updates produces one write
//! after the burst goes quiet.

mod debounce;
pub mod manifest;
pub mod store;

pub use manifest::{CacheEntry, Manifest};
pub use store::{CacheEntryInfo, CacheOptions, ContentCache, Lookup};

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

/// Escape a cache key into a file-system-safe token.
///
/// Bytes outside `[A-Za-z0-9-_.~]` become `%XX`, so distinct keys always
/// map to distinct tokens.
pub fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            escaped.push(byte as char);
        } else {
            let _ = write!(escaped, "%{:02X}", byte);
        }
    }
    escaped
}

/// Reverse [`escape_key`]; malformed escapes are kept literally
pub fn unescape_key(escaped: &str) -> String {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(byte) = hex {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Temp file next to `path`, hidden so blob listings skip it
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

/// Replace `path` with `contents` via a temp file and rename
pub(crate) async fn replace_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let temp = temp_path(path);
    if let Err(e) = tokio::fs::write(&temp, contents).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e);
    }
    Ok(())
}

/// Blocking [`replace_file`], for use from `Drop`
pub(crate) fn replace_file_sync(path: &Path, contents: &[u8]) -> io::Result<()> {
    let temp = temp_path(path);
    let result = std::fs::write(&temp, contents).and_then(|_| std::fs::rename(&temp, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&temp);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn escape_keeps_safe_bytes() {
        assert_eq!(escape_key("abc-_.~XYZ09"), "abc-_.~XYZ09");
        assert_eq!(
            escape_key("https://x.io/a?b=1"),
            "https%3A%2F%2Fx.io%2Fa%3Fb%3D1"
        );
        assert_eq!(escape_key("é"), "%C3%A9");
    }

    #[test]
    fn escape_is_injective_on_percent() {
        assert_ne!(escape_key("%41"), escape_key("A"));
    }

    #[test]
    fn unescape_reverses_escape() {
        for key in ["https://x.io/a?b=1", "plain", "é ü", "100%"] {
            assert_eq!(unescape_key(&escape_key(key)), key);
        }
        assert_eq!(unescape_key("bad%zzend%4"), "bad%zzend%4");
    }

    #[tokio::test]
    async fn replace_file_leaves_no_temp() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blob");
        std::fs::write(&path, "old").unwrap();

        replace_file(&path, b"new").await.unwrap();
        replace_file_sync(&path, b"newer").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "newer");
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
    }
}
