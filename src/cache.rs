//! Content-addressed result cache.
//!
//! Keys are `{sha256(input)}_{tier}`; an entry is written once and only
//! replaced after an explicit invalidation. The store is an injected
//! collaborator: the pipeline only sees the [`CacheStore`] trait. Failures on either side degrade to a miss or
//! a dropped write with a warning; the cache can never fail a conversion.

use crate::compress::Quality;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Flat key-value store for finished output documents.
pub trait CacheStore: Send + Sync {
    /// Pure read; `None` on miss or on any store-side failure.
    fn lookup(&self, key: &str) -> Option<Vec<u8>>;

    /// Write-once; a later store to an existing key is a no-op. Identical
    /// input and tier re-derive identical bytes, so concurrent writers of
    /// the same key are idempotent.
    fn store(&self, key: &str, bytes: &[u8]);

    /// Drops an entry so a later [`CacheStore::store`] can replace it. The
    /// pipeline calls this when a looked-up entry turns out unreadable.
    fn invalidate(&self, _key: &str) {}
}

/// Derives the cache key for an input/tier pair.
pub fn cache_key(input: &[u8], quality: Quality) -> String {
    format!("{}_{}", sha256_hex(input), quality.token())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Directory-backed store: one `{key}.pdf` file per entry, the file's
/// existence is the index.
pub struct DirCache {
    root: PathBuf,
}

impl DirCache {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<DirCache> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(DirCache { root })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.pdf"))
    }
}

impl CacheStore for DirCache {
    fn lookup(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.entry_path(key);
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                log::warn!("cache read failed for {}: {err}", path.display());
                None
            }
        }
    }

    fn store(&self, key: &str, bytes: &[u8]) {
        let path = self.entry_path(key);
        if path.exists() {
            return;
        }
        if let Err(err) = std::fs::write(&path, bytes) {
            log::warn!("cache write failed for {}: {err}", path.display());
        }
    }

    fn invalidate(&self, key: &str) {
        let path = self.entry_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => log::warn!("cache eviction failed for {}: {err}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_digest_underscore_tier() {
        let key = cache_key(b"deck bytes", Quality::Medium);
        let (digest, tier) = key.rsplit_once('_').unwrap();
        assert_eq!(tier, "medium");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn same_input_different_tier_gives_different_keys() {
        let input = b"deck bytes";
        assert_ne!(
            cache_key(input, Quality::Low),
            cache_key(input, Quality::High)
        );
        assert_eq!(
            cache_key(input, Quality::Low),
            cache_key(input, Quality::Low)
        );
    }

    #[test]
    fn dir_cache_round_trips_and_misses() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = DirCache::new(dir.path().join("cache")).unwrap();
        assert_eq!(cache.lookup("abc_low"), None);
        cache.store("abc_low", b"finished document");
        assert_eq!(cache.lookup("abc_low").as_deref(), Some(&b"finished document"[..]));
    }

    #[test]
    fn entries_are_write_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = DirCache::new(dir.path()).unwrap();
        cache.store("abc_high", b"first");
        cache.store("abc_high", b"second");
        assert_eq!(cache.lookup("abc_high").as_deref(), Some(&b"first"[..]));
    }

    #[test]
    fn invalidation_reopens_a_key_for_writing() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = DirCache::new(dir.path()).unwrap();
        cache.store("abc_low", b"stale");
        cache.invalidate("abc_low");
        assert_eq!(cache.lookup("abc_low"), None);
        cache.store("abc_low", b"fresh");
        assert_eq!(cache.lookup("abc_low").as_deref(), Some(&b"fresh"[..]));
        // Invalidating a missing key is harmless.
        cache.invalidate("never_stored");
    }
}
