//! On-disk [`Cache`] implementation.
//!
//! Every entry is a single file inside its bucket directory:
//!
//! ```text
//! [etag_len: u32 LE][etag bytes][value bytes]
//! ```
//!
//! A `VERSION` file at the root guards the layout. When it is missing or holds
//! another version the whole directory is discarded, so a newer imgext never
//! trusts build state written by an older one.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::{Cache, CacheBucket};

const VERSION_FILE: &str = "VERSION";

/// Directory-backed [`Cache`].
///
/// ```text
/// {root}/
/// +-- VERSION
/// +-- environment/
///     +-- index
///     +-- guide/setup
/// ```
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Open the cache rooted at `root`, wiping it if `version` changed.
    ///
    /// Failures are logged and never fatal; a cache that cannot be written
    /// simply misses.
    #[must_use]
    pub fn new(root: PathBuf, version: &str) -> Self {
        check_version(&root, version);
        Self { root }
    }

    /// Root directory of this cache.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Cache for FileCache {
    fn bucket(&self, name: &str) -> Box<dyn CacheBucket> {
        Box::new(FileBucket {
            dir: self.root.join(name),
        })
    }
}

struct FileBucket {
    dir: PathBuf,
}

impl FileBucket {
    fn read_entry(path: &Path, etag: &str) -> Option<Vec<u8>> {
        let mut file = File::open(path).ok()?;

        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf).ok()?;
        let etag_len = u32::from_le_bytes(len_buf) as usize;

        let mut stored = vec![0u8; etag_len];
        file.read_exact(&mut stored).ok()?;
        if !etag.is_empty() && stored != etag.as_bytes() {
            return None;
        }

        let mut value = Vec::new();
        file.read_to_end(&mut value).ok()?;
        Some(value)
    }
}

impl CacheBucket for FileBucket {
    fn get(&self, key: &str, etag: &str) -> Option<Vec<u8>> {
        Self::read_entry(&self.dir.join(key), etag)
    }

    fn set(&self, key: &str, etag: &str, value: &[u8]) {
        let path = self.dir.join(key);
        let Some(parent) = path.parent() else {
            return;
        };
        if let Err(e) = fs::create_dir_all(parent) {
            tracing::debug!("cannot create cache directory {}: {e}", parent.display());
            return;
        }

        let etag_bytes = etag.as_bytes();
        let Ok(etag_len) = u32::try_from(etag_bytes.len()) else {
            return;
        };
        let mut buf = Vec::with_capacity(4 + etag_bytes.len() + value.len());
        buf.extend_from_slice(&etag_len.to_le_bytes());
        buf.extend_from_slice(etag_bytes);
        buf.extend_from_slice(value);

        if let Err(e) = fs::write(&path, &buf) {
            tracing::debug!("cannot write cache entry {}: {e}", path.display());
        }
    }

    fn remove(&self, key: &str) {
        let _ = fs::remove_file(self.dir.join(key));
    }
}

fn check_version(root: &Path, version: &str) {
    let version_file = root.join(VERSION_FILE);

    match fs::read_to_string(&version_file) {
        Ok(stored) if stored == version => {
            tracing::debug!("build cache version {version} is current");
            return;
        }
        Ok(stored) => {
            tracing::info!("build cache version changed ({stored} -> {version}), discarding it");
        }
        Err(_) => {
            tracing::debug!("initializing build cache at {}", root.display());
        }
    }

    if root.exists()
        && let Err(e) = fs::remove_dir_all(root)
    {
        tracing::warn!("failed to remove build cache: {e}");
    }
    if let Err(e) = fs::create_dir_all(root) {
        tracing::warn!("failed to create build cache: {e}");
        return;
    }
    if let Err(e) = fs::write(&version_file, version) {
        tracing::warn!("failed to write build cache version: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(tmp: &TempDir, version: &str) -> FileCache {
        FileCache::new(tmp.path().join("cache"), version)
    }

    #[test]
    fn test_hit_requires_matching_etag() {
        let tmp = TempDir::new().unwrap();
        let bucket = open(&tmp, "1").bucket("environment");

        bucket.set("index", "100:200", b"record");

        assert_eq!(bucket.get("index", "100:200"), Some(b"record".to_vec()));
        assert_eq!(bucket.get("index", "100:201"), None);
        assert_eq!(bucket.get("index", ""), Some(b"record".to_vec()));
    }

    #[test]
    fn test_missing_key_misses() {
        let tmp = TempDir::new().unwrap();
        let bucket = open(&tmp, "1").bucket("environment");
        assert_eq!(bucket.get("absent", ""), None);
    }

    #[test]
    fn test_docname_with_directories() {
        let tmp = TempDir::new().unwrap();
        let bucket = open(&tmp, "1").bucket("environment");

        bucket.set("guide/install/linux", "e", b"nested");
        assert_eq!(
            bucket.get("guide/install/linux", "e"),
            Some(b"nested".to_vec())
        );
    }

    #[test]
    fn test_overwrite_replaces_etag() {
        let tmp = TempDir::new().unwrap();
        let bucket = open(&tmp, "1").bucket("environment");

        bucket.set("index", "old", b"first");
        bucket.set("index", "new", b"second");

        assert_eq!(bucket.get("index", "old"), None);
        assert_eq!(bucket.get("index", "new"), Some(b"second".to_vec()));
    }

    #[test]
    fn test_remove_entry() {
        let tmp = TempDir::new().unwrap();
        let bucket = open(&tmp, "1").bucket("environment");

        bucket.set("index", "e", b"x");
        bucket.remove("index");
        assert_eq!(bucket.get("index", ""), None);
    }

    #[test]
    fn test_buckets_do_not_share_keys() {
        let tmp = TempDir::new().unwrap();
        let cache = open(&tmp, "1");

        cache.bucket("environment").set("index", "e", b"env");
        cache.bucket("other").set("index", "e", b"other");

        assert_eq!(
            cache.bucket("environment").get("index", "e"),
            Some(b"env".to_vec())
        );
    }

    #[test]
    fn test_same_version_keeps_entries() {
        let tmp = TempDir::new().unwrap();
        open(&tmp, "1").bucket("environment").set("index", "e", b"kept");

        let reopened = open(&tmp, "1");
        assert_eq!(
            reopened.bucket("environment").get("index", "e"),
            Some(b"kept".to_vec())
        );
    }

    #[test]
    fn test_version_change_discards_entries() {
        let tmp = TempDir::new().unwrap();
        open(&tmp, "1").bucket("environment").set("index", "e", b"stale");

        let reopened = open(&tmp, "2");
        assert_eq!(reopened.bucket("environment").get("index", "e"), None);
        assert_eq!(
            fs::read_to_string(reopened.root().join(VERSION_FILE)).unwrap(),
            "2"
        );
    }

    #[test]
    fn test_creates_missing_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("out/.doctrees/cache");

        let cache = FileCache::new(root.clone(), "1");
        assert!(cache.root().exists());
        assert_eq!(fs::read_to_string(root.join(VERSION_FILE)).unwrap(), "1");
    }
}
